//! Health endpoints backed by a shared readiness flag.

use std::fmt;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tonic::service::RoutesBuilder;
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;

use crate::grpc::GrpcHandler;
use crate::health::state::Readiness;

/// gRPC health service name.
pub const GRPC_HEALTH_SERVICE: &str = "grpc.health.v1.Health";

// The empty service name reports the whole server.
const WHOLE_SERVER: &str = "";

type Register = Arc<dyn Fn(&mut RoutesBuilder) + Send + Sync>;

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
    pub ready: bool,
}

/// Liveness and readiness for one process.
///
/// Cheap to clone; every clone shares the same readiness flag and gRPC
/// health reporter.
#[derive(Clone)]
pub struct HealthServer {
    readiness: Arc<Readiness>,
    reporter: HealthReporter,
    register: Register,
}

impl fmt::Debug for HealthServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthServer")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl HealthServer {
    /// A not-ready health server. The gRPC service reports `NOT_SERVING`
    /// until [`set_ready`](Self::set_ready) says otherwise.
    pub async fn new() -> Self {
        let (reporter, service) = tonic_health::server::health_reporter();
        reporter
            .set_service_status(WHOLE_SERVER, ServingStatus::NotServing)
            .await;

        Self {
            readiness: Arc::new(Readiness::new()),
            reporter,
            register: Arc::new(move |routes: &mut RoutesBuilder| {
                routes.add_service(service.clone());
            }),
        }
    }

    /// Update the HTTP probes and the gRPC serving status together.
    pub async fn set_ready(&self, ready: bool) {
        self.readiness.set(ready);
        let status = if ready {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        };
        self.reporter.set_service_status(WHOLE_SERVER, status).await;
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.get()
    }

    /// `GET /health/live` and `GET /health/ready`.
    pub fn http_router(&self) -> Router {
        Router::new()
            .route("/health/live", get(live))
            .route("/health/ready", get(ready))
            .with_state(self.clone())
    }
}

impl GrpcHandler for HealthServer {
    fn service_name(&self) -> &str {
        GRPC_HEALTH_SERVICE
    }

    fn register(&self, routes: &mut RoutesBuilder) {
        (self.register)(routes);
    }
}

async fn live(State(health): State<HealthServer>) -> Json<ProbeResponse> {
    Json(ProbeResponse {
        status: "alive",
        ready: health.is_ready(),
    })
}

async fn ready(State(health): State<HealthServer>) -> Response {
    if health.is_ready() {
        (
            StatusCode::OK,
            Json(ProbeResponse {
                status: "ready",
                ready: true,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse {
                status: "not ready",
                ready: false,
            }),
        )
            .into_response()
    }
}

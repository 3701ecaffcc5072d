//! Middleware stacks for the REST listeners.
//!
//! Public: request ID → trace → request ID propagation → request timeout.
//! Admin: trace → request timeout.

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Wrap public routes with request IDs, tracing and a per-request deadline.
pub fn public_stack(router: Router, context_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                context_timeout,
            )),
    )
}

/// Wrap admin routes with tracing and a per-request deadline.
pub fn admin_stack(router: Router, context_timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                context_timeout,
            )),
    )
}

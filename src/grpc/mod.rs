//! Public gRPC listener.
//!
//! # Data Flow
//! ```text
//! GrpcHandler::register() for each registered handler
//!     → one tonic Routes table (paths are /<package.Service>/<Method>)
//!     → tonic transport server on the bound TcpListener
//! ```
//!
//! # Design Decisions
//! - Handlers add their own tonic services; this module only collects and serves
//! - Graceful stop lets in-flight calls finish; immediate stop drops the server

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::{Routes, RoutesBuilder};
use tonic::transport::Server;

use crate::error::ServerError;
use crate::lifecycle::control::{RunControl, RunPhase};
use crate::lifecycle::ManagedServer;
use crate::net;

/// A gRPC service exposed on the public gRPC listener.
pub trait GrpcHandler: Send + Sync {
    /// Fully qualified service name, e.g. `grpc.health.v1.Health`.
    fn service_name(&self) -> &str;

    /// Add the service's tonic server to `routes`.
    fn register(&self, routes: &mut RoutesBuilder);
}

/// Collect every handler's service into one routing table.
pub fn grpc_routes(handlers: &[Arc<dyn GrpcHandler>]) -> Routes {
    let mut builder = Routes::builder();
    for handler in handlers {
        tracing::debug!(service = %handler.service_name(), "Registering gRPC service");
        handler.register(&mut builder);
    }
    builder.routes()
}

/// Tonic server bound to one address.
///
/// One-shot: the routes are consumed by the first `start`.
pub struct GrpcListener {
    name: String,
    bind_address: String,
    routes: Mutex<Option<Routes>>,
    local_addr: OnceLock<SocketAddr>,
    control: RunControl,
}

impl GrpcListener {
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>, routes: Routes) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
            routes: Mutex::new(Some(routes)),
            local_addr: OnceLock::new(),
            control: RunControl::new(),
        }
    }

    /// The bound address, once `start` has bound the socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn phase(&self) -> RunPhase {
        self.control.phase()
    }
}

/// Build the public gRPC listener for `handlers`.
pub fn public_grpc_listener(
    name: &str,
    bind_address: &str,
    handlers: &[Arc<dyn GrpcHandler>],
) -> GrpcListener {
    GrpcListener::new(name, bind_address, grpc_routes(handlers))
}

#[async_trait]
impl ManagedServer for GrpcListener {
    async fn start(&self) -> Result<(), ServerError> {
        self.control
            .run(&self.name, |mut shutdown| async move {
                let routes = self
                    .routes
                    .lock()
                    .expect("routes mutex poisoned")
                    .take()
                    .ok_or_else(|| ServerError::AlreadyStarted {
                        name: self.name.clone(),
                    })?;

                let listener = net::bind(&self.name, &self.bind_address).await?;
                let addr = listener.local_addr()?;
                let _ = self.local_addr.set(addr);

                tracing::info!(server = %self.name, address = %addr, "gRPC server starting");

                Server::builder()
                    .add_routes(routes)
                    .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                        shutdown.recv().await
                    })
                    .await
                    .map_err(ServerError::other)?;

                tracing::info!(server = %self.name, "gRPC server stopped");
                Ok(())
            })
            .await
    }

    async fn stop(&self) -> Result<(), ServerError> {
        self.control.stop().await;
        Ok(())
    }

    async fn graceful_stop(&self) -> Result<(), ServerError> {
        self.control.graceful_stop().await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

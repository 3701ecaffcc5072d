//! HTTP listener as a managed server.
//!
//! # Responsibilities
//! - Bind the configured address when started
//! - Serve an Axum router
//! - Drain in-flight requests on graceful stop
//! - Drop the server future on immediate stop

use std::net::SocketAddr;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use axum::Router;

use crate::error::ServerError;
use crate::lifecycle::control::{RunControl, RunPhase};
use crate::lifecycle::ManagedServer;
use crate::net;

/// An Axum router bound to one address.
///
/// One-shot: the router is consumed by the first `start`.
pub struct HttpListener {
    name: String,
    bind_address: String,
    router: Mutex<Option<Router>>,
    local_addr: OnceLock<SocketAddr>,
    control: RunControl,
}

impl HttpListener {
    /// Create a listener. Nothing is bound until `start`.
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
            router: Mutex::new(Some(router)),
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

#[async_trait]
impl ManagedServer for HttpListener {
    async fn start(&self) -> Result<(), ServerError> {
        self.control
            .run(&self.name, |mut shutdown| async move {
                let router = self
                    .router
                    .lock()
                    .expect("router mutex poisoned")
                    .take()
                    .ok_or_else(|| ServerError::AlreadyStarted {
                        name: self.name.clone(),
                    })?;

                let listener = net::bind(&self.name, &self.bind_address).await?;
                let addr = listener.local_addr()?;
                let _ = self.local_addr.set(addr);

                tracing::info!(server = %self.name, address = %addr, "HTTP server starting");

                axum::serve(listener, router)
                    .with_graceful_shutdown(async move { shutdown.recv().await })
                    .await?;

                tracing::info!(server = %self.name, "HTTP server stopped");
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

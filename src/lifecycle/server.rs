//! The lifecycle contract every supervised server implements.

use async_trait::async_trait;

use crate::error::ServerError;

/// A server that can be started, stopped and named.
///
/// Implementations own their listener resources. `start` resolves only when
/// the server has terminated; `stop` and `graceful_stop` resolve only once
/// it has fully stopped, are idempotent, and are safe to call even if
/// `start` was never called or never returned.
#[async_trait]
pub trait ManagedServer: Send + Sync {
    /// Serve until terminated.
    async fn start(&self) -> Result<(), ServerError>;

    /// Stop immediately.
    async fn stop(&self) -> Result<(), ServerError>;

    /// Stop after in-flight work has completed.
    async fn graceful_stop(&self) -> Result<(), ServerError>;

    /// Constant, human-readable identifier used in logs.
    fn name(&self) -> &str;
}

//! TCP listener binding.

use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::error::ServerError;

/// Bind a TCP listener to `address` (e.g. `"0.0.0.0:8080"`).
pub async fn bind(server: &str, address: &str) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = address.parse().map_err(|e| ServerError::Bind {
        address: address.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })?;

    let local_addr = listener.local_addr()?;
    tracing::info!(server = %server, address = %local_addr, "Listener bound");

    Ok(listener)
}

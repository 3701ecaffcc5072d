//! HTTP listeners.
//!
//! # Data Flow
//! ```text
//! Router (user routes or admin routes)
//!     → middleware.rs (request ID, trace, timeout)
//!     → server.rs (HttpListener: bind on start, serve, drain on stop)
//!     → composite / supervisor lifecycle
//! ```

pub mod middleware;
pub mod server;

pub use server::HttpListener;

//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor marks ready after wiring listeners (state.rs)
//!     → HTTP probes on the admin listener (server.rs)
//!     → tonic-health `grpc.health.v1.Health` on the public gRPC listener (server.rs)
//! Supervisor marks not ready when shutdown begins
//! ```
//!
//! # Design Decisions
//! - One readiness flag per process, shared by every probe surface
//! - Liveness never depends on readiness

pub mod server;
pub mod state;

pub use server::HealthServer;

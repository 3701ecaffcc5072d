//! Multi-listener service runtime.
//!
//! Runs the admin REST, public REST, public gRPC and health listeners of one
//! service, plus any background workers, as a single lifecycle unit.
//!
//! ```text
//!  main.rs ──start──▶ Supervisor ──assemble──▶ CompositeServer
//!     ▲                                          │ fan out
//!     │ first exit / OS signal                   ▼
//!     └────stop / graceful_stop────  admin │ public REST │ public gRPC │ workers
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod grpc;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod worker;

pub use config::ServiceConfig;
pub use error::{AggregatedError, Misconfiguration, Operation, ServerError};
pub use lifecycle::{CompositeServer, ManagedServer, Supervisor};

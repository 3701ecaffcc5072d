//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → structured tracing events and spans
//!     → logging.rs subscriber (pretty, compact or JSON on stdout)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through the public REST middleware into trace spans
//! - The composite server's span ties sub-server log lines to one process

pub mod logging;

pub use logging::init_logging;

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Contract (server.rs):
//!     ManagedServer { start, stop, graceful_stop, name }
//!
//! Composition (composite.rs):
//!     N servers → start: first exit wins → stop: wait for all, aggregate errors
//!
//! Supervision (supervisor.rs):
//!     config + handlers → enabled listeners → one composite → process entry point
//!
//! Concrete servers (control.rs, shutdown.rs):
//!     Idle → Running → Stopped, driven by latched graceful / forced signals
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → entry point asks the supervisor to stop
//! ```
//!
//! # Design Decisions
//! - Composites are servers too, so supervision nests
//! - Shutdown has no intrinsic timeout: the entry point imposes one

pub mod composite;
pub mod control;
pub mod server;
pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use composite::{CompositeServer, CompositeState, COMPOSITE_SERVER_NAME};
pub use control::{RunControl, RunPhase};
pub use server::ManagedServer;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use supervisor::{Hooks, RestHandlers, Supervisor, SupervisorBuilder};

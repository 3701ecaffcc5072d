//! Network layer.
//!
//! # Data Flow
//! ```text
//! configured bind address
//!     → listener.rs (parse, bind, log local address)
//!     → handed to the HTTP layer to serve
//! ```
//!
//! # Design Decisions
//! - Sockets are bound inside `start`, never at construction, so a process
//!   that refuses to start never holds a port

pub mod listener;

pub use listener::bind;

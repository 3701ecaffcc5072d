//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed to the supervisor builder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - Optional sections double as enable flags for listeners
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, LibraryConfig, LogConfig, LogFormat, PublicGrpcConfig, PublicRestConfig,
    ServiceConfig, ShutdownConfig,
};
pub use validation::ValidationError;

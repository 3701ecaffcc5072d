//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate bind addresses and detect two listeners on one address
//! - Validate value ranges (grace period > 0, known log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Whether any public listener is enabled is not checked here; the
//!   supervisor treats that as fatal at start

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("service name must not be empty")]
    EmptyName,

    #[error("{listener}: invalid bind address {address:?}")]
    InvalidBindAddress { listener: &'static str, address: String },

    #[error("{first} and {second} are both bound to {address}")]
    AddressConflict {
        first: &'static str,
        second: &'static str,
        address: SocketAddr,
    },

    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),

    #[error("shutdown.grace_period_secs must be greater than zero")]
    ZeroGracePeriod,
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    let level = config.library.log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.library.log.level.clone(),
        ));
    }

    if config.shutdown.grace_period_secs == 0 {
        errors.push(ValidationError::ZeroGracePeriod);
    }

    let listeners = [
        ("admin", config.admin.as_ref().map(|c| &c.bind_address)),
        ("public_rest", config.public_rest.as_ref().map(|c| &c.bind_address)),
        ("public_grpc", config.public_grpc.as_ref().map(|c| &c.bind_address)),
    ];

    let mut bound: HashMap<SocketAddr, &'static str> = HashMap::new();
    for (listener, address) in listeners {
        let Some(address) = address else { continue };
        match address.parse::<SocketAddr>() {
            Ok(addr) => {
                // Port 0 asks the OS for a fresh port, so it never conflicts.
                if addr.port() == 0 {
                    continue;
                }
                if let Some(first) = bound.insert(addr, listener) {
                    errors.push(ValidationError::AddressConflict {
                        first,
                        second: listener,
                        address: addr,
                    });
                }
            }
            Err(_) => errors.push(ValidationError::InvalidBindAddress {
                listener,
                address: address.clone(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

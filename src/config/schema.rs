//! Configuration schema definitions.
//!
//! A section that is absent disables the component it configures.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for one service process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, used in logs and `/admin/status`.
    pub name: String,

    /// Settings shared by every listener.
    pub library: LibraryConfig,

    /// Admin REST listener. Absent = disabled.
    pub admin: Option<AdminConfig>,

    /// Public REST listener. Absent = disabled.
    pub public_rest: Option<PublicRestConfig>,

    /// Public gRPC listener. Absent = disabled.
    pub public_grpc: Option<PublicGrpcConfig>,

    pub shutdown: ShutdownConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            library: LibraryConfig::default(),
            admin: None,
            public_rest: None,
            public_grpc: None,
            shutdown: ShutdownConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Enable the health server (HTTP probes and gRPC health service).
    pub health: bool,

    pub log: LogConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            health: true,
            log: LogConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Admin REST listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address (e.g., "127.0.0.1:8081").
    pub bind_address: String,

    /// Bearer token required on `/admin/*`. Absent = no guard.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: None,
        }
    }
}

/// Public REST listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublicRestConfig {
    pub bind_address: String,

    /// Per-request context timeout in seconds. 0 = default.
    pub context_timeout_secs: u64,
}

impl Default for PublicRestConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            context_timeout_secs: 0,
        }
    }
}

/// Public gRPC listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublicGrpcConfig {
    pub bind_address: String,
}

impl Default for PublicGrpcConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Process shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long a graceful stop may take before it is escalated.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
        }
    }
}

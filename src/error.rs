//! Error types shared by every managed server.
//!
//! # Design Decisions
//! - One error enum crosses the lifecycle boundary so composites can wrap
//!   sub-server failures without erasing them
//! - Sub-server indices are 1-based, matching the log lines
//! - Shutdown failures are never dropped: zero errors is `Ok`, one error is
//!   returned as-is, two or more become an [`AggregatedError`]

use std::fmt;

/// The lifecycle operation a failure was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    GracefulStop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Start => write!(f, "start"),
            Operation::Stop => write!(f, "stop"),
            Operation::GracefulStop => write!(f, "graceful stop"),
        }
    }
}

/// Error returned by [`ManagedServer`](crate::lifecycle::ManagedServer) operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind a listening socket.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `start` was called on a server that is already running or was consumed.
    #[error("{name} has already been started")]
    AlreadyStarted { name: String },

    /// A sub-server returned an error.
    #[error("server {index} ({name}) returned an error during {operation}: {source}")]
    SubServer {
        index: usize,
        name: String,
        operation: Operation,
        #[source]
        source: Box<ServerError>,
    },

    /// A sub-server panicked; the panic was contained and converted.
    #[error("server {index} ({name}) panicked during {operation}: {message}")]
    Panicked {
        index: usize,
        name: String,
        operation: Operation,
        message: String,
    },

    /// The task driving a sub-server was cancelled by the runtime.
    #[error("server {index} ({name}) was cancelled during {operation}")]
    Cancelled {
        index: usize,
        name: String,
        operation: Operation,
    },

    /// Two or more sub-servers failed to shut down.
    #[error(transparent)]
    Aggregated(#[from] AggregatedError),

    /// Collaborator-defined failure.
    #[error("{0}")]
    Failed(String),

    /// Collaborator-defined failure carrying its own error type.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ServerError {
    /// Build a plain failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        ServerError::Failed(message.into())
    }

    /// Wrap an arbitrary error raised by a collaborator.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ServerError::Other(Box::new(error))
    }

    /// Attach sub-server position and name to an error.
    pub fn in_sub_server(self, index: usize, name: &str, operation: Operation) -> Self {
        ServerError::SubServer {
            index,
            name: name.to_string(),
            operation,
            source: Box::new(self),
        }
    }
}

/// Several shutdown failures reported as one error.
///
/// Never holds fewer than two errors; see [`AggregatedError::collect`].
#[derive(Debug)]
pub struct AggregatedError {
    message: String,
    errors: Vec<ServerError>,
}

impl AggregatedError {
    /// Fold a list of failures into a single result.
    ///
    /// No errors yields `Ok(())`, one error is returned unchanged, anything
    /// more is aggregated under `message`.
    pub fn collect(message: impl Into<String>, mut errors: Vec<ServerError>) -> Result<(), ServerError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ServerError::Aggregated(AggregatedError {
                message: message.into(),
                errors,
            })),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying failures, in sub-server order.
    pub fn errors(&self) -> &[ServerError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; sub-error(s): ", self.message)?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}

/// Neither a public REST nor a public gRPC listener is enabled.
///
/// A process in this state serves nothing and cannot be stopped through
/// its listeners, so it is treated as fatal rather than returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("REST and gRPC servers cannot both be disabled: at least one public listener is required")]
pub struct Misconfiguration;

//! Runs a fixed set of servers as one.
//!
//! # Semantics
//! ```text
//! start:          spawn one task per server → return the FIRST outcome
//! stop / graceful_stop:
//!                 spawn one task per server → wait for ALL → aggregate errors
//! ```
//!
//! # Design Decisions
//! - First exit wins on start: any listener terminating ends the whole
//!   process, so callers must stop the composite once `start` returns
//! - The result channel holds one slot per server and its receiver is
//!   dropped after the first result, so late tasks never block on send
//! - Every task boundary contains panics, on start and shutdown alike
//! - Shutdown is exhaustive: one task per server whether or not its `start`
//!   ever returned
//! - `stop` during a graceful stop escalates: every sub-server is stopped
//!   immediately
//! - Shutdown runs on its own task and always ends in `Stopped`, even if the
//!   caller gives up waiting; a later `stop` can still escalate it

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use crate::error::{AggregatedError, Operation, ServerError};
use crate::lifecycle::server::ManagedServer;

/// Name reported by every composite, whatever it contains.
pub const COMPOSITE_SERVER_NAME: &str = "composite-server";

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeState {
    Uninitialized,
    Running,
    Stopping,
    GracefullyStopping,
    Stopped,
}

/// A [`ManagedServer`] made of other managed servers.
pub struct CompositeServer {
    servers: Vec<Arc<dyn ManagedServer>>,
    span: tracing::Span,
    state: Arc<watch::Sender<CompositeState>>,
}

impl CompositeServer {
    /// Create a composite over `servers`; logging happens inside the current span.
    pub fn new(servers: Vec<Arc<dyn ManagedServer>>) -> Self {
        Self::with_span(servers, tracing::Span::current())
    }

    /// Create a composite whose fan-out tasks log inside `span`.
    pub fn with_span(servers: Vec<Arc<dyn ManagedServer>>, span: tracing::Span) -> Self {
        let (state, _) = watch::channel(CompositeState::Uninitialized);
        Self {
            servers,
            span,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> CompositeState {
        *self.state.borrow()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Names of the contained servers, in start order.
    pub fn server_names(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.name().to_string()).collect()
    }

    async fn shut_down(&self, operation: Operation) -> Result<(), ServerError> {
        let transitional = match operation {
            Operation::GracefulStop => CompositeState::GracefullyStopping,
            _ => CompositeState::Stopping,
        };

        let mut previous = CompositeState::Uninitialized;
        self.state.send_if_modified(|state| {
            previous = *state;
            match (*state, operation) {
                (CompositeState::Running, _)
                | (CompositeState::GracefullyStopping, Operation::Stop) => {
                    *state = transitional;
                    true
                }
                (CompositeState::Uninitialized, _) => {
                    *state = CompositeState::Stopped;
                    true
                }
                _ => false,
            }
        });

        match previous {
            CompositeState::Running => {}
            CompositeState::GracefullyStopping if operation == Operation::Stop => {
                tracing::warn!(parent: &self.span, "Escalating graceful stop to immediate stop");
            }
            CompositeState::Uninitialized => {
                tracing::debug!(parent: &self.span, "Composite never started, nothing to stop");
                return Ok(());
            }
            _ => {
                // Another caller owns the teardown; wait for it to finish.
                let mut rx = self.state.subscribe();
                let _ = rx.wait_for(|s| *s == CompositeState::Stopped).await;
                return Ok(());
            }
        }

        // Detached so the composite still reaches `Stopped` if this caller
        // stops waiting, e.g. a timeout around `graceful_stop`.
        let teardown = tokio::spawn(
            tear_down(self.servers.clone(), Arc::clone(&self.state), operation)
                .instrument(self.span.clone()),
        );
        match teardown.await {
            Ok(result) => result,
            Err(err) => Err(ServerError::other(err)),
        }
    }
}

#[async_trait]
impl ManagedServer for CompositeServer {
    async fn start(&self) -> Result<(), ServerError> {
        let began = self.state.send_if_modified(|state| {
            if *state == CompositeState::Uninitialized {
                *state = CompositeState::Running;
                true
            } else {
                false
            }
        });
        if !began {
            return match self.state() {
                CompositeState::Running => Err(ServerError::AlreadyStarted {
                    name: COMPOSITE_SERVER_NAME.to_string(),
                }),
                _ => Ok(()),
            };
        }

        let total = self.servers.len();
        if total == 0 {
            tracing::warn!(parent: &self.span, "Composite has no sub-servers, nothing to start");
            return Ok(());
        }

        // Start all servers and block until the first one terminates.
        let (tx, mut rx) = mpsc::channel(total);
        for (i, server) in self.servers.iter().enumerate() {
            let index = i + 1;
            let server = Arc::clone(server);
            let tx = tx.clone();
            tokio::spawn(
                async move {
                    let name = server.name().to_string();
                    tracing::info!(server = %name, "starting sub-server {} of {} ({})", index, total, name);
                    let outcome = contain(index, &name, Operation::Start, async move {
                        server.start().await
                    })
                    .await;
                    if let Err(err) = &outcome {
                        tracing::debug!(server = %name, error = %err, "Sub-server exited with error");
                    }
                    // Fails fast once the first result has been taken.
                    let _ = tx.send(outcome).await;
                }
                .instrument(self.span.clone()),
            );
        }
        drop(tx);

        match rx.recv().await {
            Some(outcome) => outcome,
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<(), ServerError> {
        self.shut_down(Operation::Stop).await
    }

    async fn graceful_stop(&self) -> Result<(), ServerError> {
        self.shut_down(Operation::GracefulStop).await
    }

    fn name(&self) -> &str {
        COMPOSITE_SERVER_NAME
    }
}

/// Fan `operation` out to every server and wait for all of them.
async fn tear_down(
    servers: Vec<Arc<dyn ManagedServer>>,
    state: Arc<watch::Sender<CompositeState>>,
    operation: Operation,
) -> Result<(), ServerError> {
    let _settle = SettleOnDrop(state);

    let total = servers.len();
    let (verb, done) = match operation {
        Operation::GracefulStop => ("graceful-stopping", "graceful-stopped"),
        _ => ("stopping", "stopped"),
    };

    let mut tasks = JoinSet::new();
    for (i, server) in servers.into_iter().enumerate() {
        let index = i + 1;
        tasks.spawn(
            async move {
                let name = server.name().to_string();
                tracing::info!(server = %name, "{} sub-server {} of {} ({})...", verb, index, total, name);
                let outcome = contain(index, &name, operation, async move {
                    match operation {
                        Operation::GracefulStop => server.graceful_stop().await,
                        _ => server.stop().await,
                    }
                })
                .await;
                tracing::info!(server = %name, "{} sub-server {} of {} ({})", done, index, total, name);
                (index, outcome.err())
            }
            .in_current_span(),
        );
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Some(err))) => failures.push((index, err)),
            Ok((_, None)) => {}
            // `contain` already catches panics; this only fires on runtime shutdown.
            Err(err) => tracing::warn!(error = %err, "Shutdown task lost"),
        }
    }
    failures.sort_by_key(|(index, _)| *index);

    let message = match operation {
        Operation::GracefulStop => "error during graceful stop",
        _ => "error during stop",
    };
    AggregatedError::collect(message, failures.into_iter().map(|(_, e)| e).collect())
}

/// Marks the composite stopped when dropped, including on runtime shutdown.
struct SettleOnDrop(Arc<watch::Sender<CompositeState>>);

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(CompositeState::Stopped);
    }
}

/// Run one sub-server operation on its own task, converting errors and
/// panics into position-tagged [`ServerError`]s.
async fn contain<F>(index: usize, name: &str, operation: Operation, op: F) -> Result<(), ServerError>
where
    F: Future<Output = Result<(), ServerError>> + Send + 'static,
{
    match tokio::spawn(op).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.in_sub_server(index, name, operation)),
        Err(join_err) => Err(from_join_error(index, name, operation, join_err)),
    }
}

fn from_join_error(index: usize, name: &str, operation: Operation, err: JoinError) -> ServerError {
    if err.is_panic() {
        let message = panic_message(err.into_panic());
        tracing::error!(server = %name, %operation, panic = %message, "Sub-server panicked");
        ServerError::Panicked {
            index,
            name: name.to_string(),
            operation,
            message,
        }
    } else {
        ServerError::Cancelled {
            index,
            name: name.to_string(),
            operation,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

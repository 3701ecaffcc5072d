//! Run/stop bookkeeping for a single concrete server.
//!
//! # States
//! ```text
//! Idle ──start──▶ Running ──serve future ends──▶ Stopped
//!   │                                              ▲
//!   └──────────────stop / graceful_stop────────────┘
//! ```
//!
//! # Design Decisions
//! - Stopping an idle server marks it stopped; a later `start` returns at once
//! - Graceful and forced shutdown are separate latched signals
//! - The phase reaches `Stopped` even if the serve future panics or is dropped

use std::future::Future;
use tokio::sync::watch;

use crate::error::ServerError;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};

/// Lifecycle phase of a concrete server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Stopped,
}

/// Drives one serve future and lets other tasks stop it.
#[derive(Debug)]
pub struct RunControl {
    phase: watch::Sender<RunPhase>,
    graceful: Shutdown,
    force: Shutdown,
}

impl RunControl {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(RunPhase::Idle);
        Self {
            phase,
            graceful: Shutdown::new(),
            force: Shutdown::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Run `serve` until it finishes or a forced stop is requested.
    ///
    /// `serve` receives the graceful shutdown signal and is expected to
    /// drain and return once it fires.
    pub async fn run<F, Fut>(&self, name: &str, serve: F) -> Result<(), ServerError>
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = Result<(), ServerError>>,
    {
        let graceful = self.graceful.subscribe();
        let mut force = self.force.subscribe();

        let mut previous = RunPhase::Idle;
        let began = self.phase.send_if_modified(|phase| {
            previous = *phase;
            if *phase == RunPhase::Idle {
                *phase = RunPhase::Running;
                true
            } else {
                false
            }
        });

        if !began {
            return match previous {
                RunPhase::Running => Err(ServerError::AlreadyStarted {
                    name: name.to_string(),
                }),
                _ => {
                    tracing::debug!(server = %name, "Stopped before start, not serving");
                    Ok(())
                }
            };
        }

        let _stopped = MarkStopped(&self.phase);
        tokio::select! {
            result = serve(graceful) => result,
            _ = force.recv() => {
                tracing::debug!(server = %name, "Forced stop, dropping serve future");
                Ok(())
            }
        }
    }

    /// Request an immediate stop and wait until the server has stopped.
    pub async fn stop(&self) {
        self.force.trigger();
        self.settle().await;
    }

    /// Request a draining stop and wait until the server has stopped.
    pub async fn graceful_stop(&self) {
        self.graceful.trigger();
        self.settle().await;
    }

    async fn settle(&self) {
        self.phase.send_if_modified(|phase| {
            if *phase == RunPhase::Idle {
                *phase = RunPhase::Stopped;
                true
            } else {
                false
            }
        });

        let mut rx = self.phase.subscribe();
        // The sender lives in `self`, so this only ends once the phase is reached.
        let _ = rx.wait_for(|phase| *phase == RunPhase::Stopped).await;
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

struct MarkStopped<'a>(&'a watch::Sender<RunPhase>);

impl Drop for MarkStopped<'_> {
    fn drop(&mut self) {
        self.0.send_replace(RunPhase::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn stop_before_start_skips_serving() {
        let control = RunControl::new();
        control.stop().await;
        assert_eq!(control.phase(), RunPhase::Stopped);

        let result = control
            .run("idle", |_| async { Err(ServerError::failed("must not run")) })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn graceful_stop_lets_serve_future_finish() {
        let control = Arc::new(RunControl::new());
        let runner = Arc::clone(&control);
        let handle = tokio::spawn(async move {
            runner
                .run("graceful", |mut signal| async move {
                    signal.recv().await;
                    Err(ServerError::failed("drained"))
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(control.phase(), RunPhase::Running);

        tokio::time::timeout(Duration::from_secs(1), control.graceful_stop())
            .await
            .expect("graceful stop hung");
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ServerError::Failed(ref m)) if m == "drained"));
    }

    #[tokio::test]
    async fn forced_stop_drops_unresponsive_future() {
        let control = Arc::new(RunControl::new());
        let runner = Arc::clone(&control);
        let handle = tokio::spawn(async move {
            runner
                .run("stubborn", |_| std::future::pending::<Result<(), ServerError>>())
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(1), control.stop())
            .await
            .expect("forced stop hung");
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(control.phase(), RunPhase::Stopped);

        // Stopping again is a no-op.
        control.stop().await;
        control.graceful_stop().await;
    }

    #[tokio::test]
    async fn second_start_while_running_is_rejected() {
        let control = Arc::new(RunControl::new());
        let runner = Arc::clone(&control);
        let first = tokio::spawn(async move {
            runner
                .run("once", |mut signal| async move {
                    signal.recv().await;
                    Ok(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = control.run("once", |_| async { Ok(()) }).await;
        assert!(matches!(second, Err(ServerError::AlreadyStarted { .. })));

        control.graceful_stop().await;
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn panicking_serve_future_still_reaches_stopped() {
        let control = Arc::new(RunControl::new());
        let runner = Arc::clone(&control);
        let handle = tokio::spawn(async move {
            runner
                .run("panics", |_| async {
                    if true {
                        panic!("listener exploded");
                    }
                    Ok(())
                })
                .await
        });

        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(control.phase(), RunPhase::Stopped);
        tokio::time::timeout(Duration::from_secs(1), control.stop())
            .await
            .expect("stop after panic hung");
    }
}

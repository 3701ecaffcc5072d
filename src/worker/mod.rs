//! Background workers as managed servers.
//!
//! A worker is a job that runs for the life of the process and is started and
//! stopped alongside the listeners. Graceful stop raises the job's shutdown
//! signal and waits for it to return; immediate stop drops the job.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::ServerError;
use crate::lifecycle::control::{RunControl, RunPhase};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::ManagedServer;

type Job = Box<dyn FnOnce(ShutdownSignal) -> BoxFuture<'static, Result<(), ServerError>> + Send>;

pub struct BackgroundWorker {
    name: String,
    job: Mutex<Option<Job>>,
    control: RunControl,
}

impl BackgroundWorker {
    pub fn new<F, Fut>(name: impl Into<String>, job: F) -> Self
    where
        F: FnOnce(ShutdownSignal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ServerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            job: Mutex::new(Some(Box::new(move |signal| job(signal).boxed()))),
            control: RunControl::new(),
        }
    }

    /// A worker that calls `tick` every `interval` until stopped.
    ///
    /// A failing tick ends the worker with that error.
    pub fn periodic<F, Fut>(name: impl Into<String>, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ServerError>> + Send + 'static,
    {
        let name = name.into();
        let label = name.clone();
        let interval = interval.max(Duration::from_millis(1));

        Self::new(name, move |mut shutdown| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => tick().await?,
                    _ = shutdown.recv() => {
                        tracing::info!(worker = %label, "Worker received shutdown signal, exiting loop");
                        return Ok(());
                    }
                }
            }
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.control.phase()
    }
}

#[async_trait]
impl ManagedServer for BackgroundWorker {
    async fn start(&self) -> Result<(), ServerError> {
        self.control
            .run(&self.name, |shutdown| async move {
                let job = self
                    .job
                    .lock()
                    .expect("worker job mutex poisoned")
                    .take()
                    .ok_or_else(|| ServerError::AlreadyStarted {
                        name: self.name.clone(),
                    })?;

                tracing::info!(worker = %self.name, "Worker starting");
                let result = job(shutdown).await;
                tracing::info!(worker = %self.name, ok = result.is_ok(), "Worker finished");
                result
            })
            .await
    }

    async fn stop(&self) -> Result<(), ServerError> {
        self.control.stop().await;
        Ok(())
    }

    async fn graceful_stop(&self) -> Result<(), ServerError> {
        self.control.graceful_stop().await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use service_runtime::{ManagedServer, ServerError};

/// What a mock's `start` does.
#[derive(Debug, Clone, Copy)]
pub enum OnStart {
    /// Return `Ok(())` after the delay.
    Succeed(Duration),
    /// Return an error with this message after the delay.
    Fail(Duration, &'static str),
    /// Panic with this message.
    Panic(&'static str),
    /// Serve until `stop` or `graceful_stop` is called.
    UntilStopped,
}

/// A scripted [`ManagedServer`] that counts every call.
pub struct MockServer {
    name: String,
    on_start: OnStart,
    stop_error: Option<&'static str>,
    stop_delay: Duration,
    stop_panics: bool,
    stuck_graceful: bool,
    stopped: watch::Sender<bool>,
    forced: watch::Sender<bool>,
    pub starts: AtomicUsize,
    pub finished: AtomicUsize,
    pub stops: AtomicUsize,
    pub graceful_stops: AtomicUsize,
}

impl MockServer {
    pub fn new(name: &str, on_start: OnStart) -> Self {
        let (stopped, _) = watch::channel(false);
        let (forced, _) = watch::channel(false);
        Self {
            name: name.to_string(),
            on_start,
            stop_error: None,
            stop_delay: Duration::ZERO,
            stop_panics: false,
            stuck_graceful: false,
            stopped,
            forced,
            starts: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            graceful_stops: AtomicUsize::new(0),
        }
    }

    pub fn blocking(name: &str) -> Self {
        Self::new(name, OnStart::UntilStopped)
    }

    /// `stop` and `graceful_stop` return this error.
    pub fn with_stop_error(mut self, message: &'static str) -> Self {
        self.stop_error = Some(message);
        self
    }

    /// `stop` and `graceful_stop` take this long.
    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn with_stop_panic(mut self) -> Self {
        self.stop_panics = true;
        self
    }

    /// `graceful_stop` only returns once `stop` has been called.
    pub fn with_stuck_graceful(mut self) -> Self {
        self.stuck_graceful = true;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn graceful_stops(&self) -> usize {
        self.graceful_stops.load(Ordering::SeqCst)
    }

    async fn finish_stop(&self) -> Result<(), ServerError> {
        tokio::time::sleep(self.stop_delay).await;
        self.stopped.send_replace(true);
        if self.stop_panics {
            panic!("{} exploded while stopping", self.name);
        }
        match self.stop_error {
            Some(message) => Err(ServerError::failed(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ManagedServer for MockServer {
    async fn start(&self) -> Result<(), ServerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let result = match self.on_start {
            OnStart::Succeed(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            OnStart::Fail(delay, message) => {
                tokio::time::sleep(delay).await;
                Err(ServerError::failed(message))
            }
            OnStart::Panic(message) => panic!("{}", message),
            OnStart::UntilStopped => {
                let mut rx = self.stopped.subscribe();
                let _ = rx.wait_for(|stopped| *stopped).await;
                Ok(())
            }
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn stop(&self) -> Result<(), ServerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.forced.send_replace(true);
        self.finish_stop().await
    }

    async fn graceful_stop(&self) -> Result<(), ServerError> {
        self.graceful_stops.fetch_add(1, Ordering::SeqCst);
        if self.stuck_graceful {
            let mut rx = self.forced.subscribe();
            let _ = rx.wait_for(|forced| *forced).await;
        }
        self.finish_stop().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Erase mock types for a composite.
pub fn servers(mocks: &[&Arc<MockServer>]) -> Vec<Arc<dyn ManagedServer>> {
    mocks
        .iter()
        .map(|m| Arc::clone(*m) as Arc<dyn ManagedServer>)
        .collect()
}

/// Poll `url` until it answers with a success status.
pub async fn wait_for_http(url: &str) -> reqwest::Response {
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(response) = client.get(url).send().await {
            if response.status().is_success() {
                return response;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} never became available", url);
}

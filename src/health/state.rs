//! Readiness state.
//!
//! # States
//! ```text
//! NotReady ──set_ready(true)──▶ Ready ──set_ready(false)──▶ NotReady
//! ```
//!
//! Starts NotReady. Transitions are logged.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct Readiness {
    ready: AtomicBool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ready: bool) {
        let was = self.ready.swap(ready, Ordering::SeqCst);
        if was != ready {
            tracing::info!(ready, "Readiness changed");
        }
    }

    pub fn get(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

//! # Tokio-backed host.
//!
//! [`TokioHost`] serializes every deferred tick and every fired timer through a
//! single worker task, so the bus sees one logical execution context even on a
//! multi-threaded runtime.
//!
//! ## Architecture
//! ```text
//! defer(cb) ───────────────────────────────┐
//!                                          ▼
//! start(d, token, cb) ─► spawn(sleep(d)) ─► [unbounded queue] ─► worker ─► cb()
//!                          └─ token cancelled → dropped            └─ panic → tracing::error!
//! ```
//!
//! ## Rules
//! - The worker exits once every `TokioHost` clone and pending timer is dropped.
//! - Panics escaping a callback are caught and logged; the worker keeps running.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::port::{Callback, Defer, Timer};
use crate::core::panic_message;

/// Host that runs bus callbacks on a dedicated Tokio task.
#[derive(Clone, Debug)]
pub struct TokioHost {
    tx: mpsc::UnboundedSender<Callback>,
}

impl TokioHost {
    /// Spawns the worker task.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();

        tokio::spawn(async move {
            while let Some(callback) = rx.recv().await {
                if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(callback)) {
                    tracing::error!(info = %panic_message(&*panic), "bus callback panicked");
                }
                tokio::task::yield_now().await;
            }
            tracing::debug!("bus host worker stopped");
        });

        Self { tx }
    }

    fn submit(&self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            tracing::debug!("bus host worker closed; callback dropped");
        }
    }
}

impl Defer for TokioHost {
    fn defer(&self, callback: Callback) {
        self.submit(callback);
    }
}

impl Timer for TokioHost {
    fn start(&self, after: Duration, cancel: CancellationToken, callback: Callback) {
        let host = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(after) => host.submit(callback),
            }
        });
    }
}

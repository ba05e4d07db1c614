//! # Bus-wide configuration.
//!
//! Provides [`BusConfig`] centralized settings for a [`Bus`](crate::Bus) instance.
//!
//! Config is used in two ways:
//! 1. **Bus creation**: `Bus::new(defer, timer, config)` or `Bus::builder(config)`
//! 2. **Request defaults**: `RequestOptions` without an explicit timeout fall back
//!    to [`BusConfig::pending_did_timeout`]
//!
//! ## Sentinel values
//! - `pending_did_timeout = 0s` → the timeout fires on the next timer turn

use std::time::Duration;

/// Configuration for a bus instance.
///
/// ## Field semantics
/// - `pending_did_timeout`: how long `request_and_gather` waits for responders that
///   announced `will...` to reply with `did...`
///
/// ## Notes
/// All fields are public for flexibility.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Default reply-gathering timeout.
    ///
    /// Can be overridden per call with `RequestOptions::with_timeout`.
    pub pending_did_timeout: Duration,
}

impl BusConfig {
    /// Resolves the effective reply timeout for one request.
    #[inline]
    pub fn reply_timeout(&self, per_call: Option<Duration>) -> Duration {
        per_call.unwrap_or(self.pending_did_timeout)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `pending_did_timeout = 120s`
    fn default() -> Self {
        Self {
            pending_did_timeout: Duration::from_secs(120),
        }
    }
}

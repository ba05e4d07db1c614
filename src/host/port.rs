//! # Scheduling ports.
//!
//! The bus never sleeps or spawns on its own. It talks to the host through two
//! ports supplied at construction:
//! - [`Defer`]: run a callback once the current synchronous execution unwinds (a tick);
//! - [`Timer`]: run a callback after a duration unless its token is cancelled.
//!
//! ## Rules
//! - Callbacks must run one at a time, on one logical execution context.
//! - A deferred callback must never run inside the `defer` call itself.
//! - A cancelled timer must not run its callback; a timer that already queued its
//!   callback may still run it (the bus guards against late timers itself).

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Unit of work handed to a host port.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Deferral port: schedules one tick.
pub trait Defer: Send + Sync + 'static {
    /// Queues `callback` to run after the current synchronous execution unwinds.
    fn defer(&self, callback: Callback);
}

/// Timer port: schedules a cancellable delayed callback.
pub trait Timer: Send + Sync + 'static {
    /// Runs `callback` after `after` has elapsed, unless `cancel` fires first.
    fn start(&self, after: Duration, cancel: CancellationToken, callback: Callback);
}

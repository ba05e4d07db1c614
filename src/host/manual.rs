//! # Deterministic manual host.
//!
//! [`ManualHost`] never runs anything on its own. Tests (or embedders with their own
//! loop) drive it explicitly:
//! - [`ManualHost::run_until_idle`] runs queued ticks until none are left;
//! - [`ManualHost::run_next`] runs exactly one queued tick;
//! - [`ManualHost::advance`] moves the virtual clock and fires due timers, draining
//!   ticks after each one.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use cyclebus::{Bus, BusConfig, ManualHost};
//!
//! let host = ManualHost::new();
//! let bus = Bus::new(host.clone(), host.clone(), BusConfig::default());
//!
//! let _done = bus.publish("greeting", "hello").unwrap();
//! assert_eq!(host.pending_ticks(), 1);
//! host.run_until_idle();
//! host.advance(Duration::from_secs(1));
//! assert_eq!(host.now(), Duration::from_secs(1));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::port::{Callback, Defer, Timer};

struct PendingTimer {
    due: Duration,
    seq: u64,
    cancel: CancellationToken,
    callback: Callback,
}

#[derive(Default)]
struct State {
    now: Duration,
    next_seq: u64,
    ticks: VecDeque<Callback>,
    timers: Vec<PendingTimer>,
}

/// Host driven by explicit calls; time is virtual.
#[derive(Default)]
pub struct ManualHost {
    state: Mutex<State>,
}

impl ManualHost {
    /// Creates a new host at virtual time zero.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of queued ticks.
    pub fn pending_ticks(&self) -> usize {
        self.state.lock().ticks.len()
    }

    /// Number of armed, not cancelled timers.
    pub fn pending_timers(&self) -> usize {
        self.state
            .lock()
            .timers
            .iter()
            .filter(|t| !t.cancel.is_cancelled())
            .count()
    }

    /// Runs one queued tick. Returns `false` if none was queued.
    pub fn run_next(&self) -> bool {
        let next = self.state.lock().ticks.pop_front();
        match next {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Runs ticks until the queue stays empty. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Moves the clock forward, firing due timers in deadline order.
    ///
    /// Ticks are drained before the first timer and after each fired timer.
    /// Returns how many timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        self.run_until_idle();
        let target = self.state.lock().now + by;
        let mut fired = 0;

        while let Some(timer) = self.take_due(target) {
            if !timer.cancel.is_cancelled() {
                (timer.callback)();
                fired += 1;
            }
            self.run_until_idle();
        }

        self.state.lock().now = target;
        fired
    }

    fn take_due(&self, target: Duration) -> Option<PendingTimer> {
        let mut st = self.state.lock();
        st.timers.retain(|t| !t.cancel.is_cancelled());
        let idx = st
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(idx, _)| idx)?;
        let timer = st.timers.swap_remove(idx);
        st.now = st.now.max(timer.due);
        Some(timer)
    }
}

impl Defer for ManualHost {
    fn defer(&self, callback: Callback) {
        self.state.lock().ticks.push_back(callback);
    }
}

impl Timer for ManualHost {
    fn start(&self, after: Duration, cancel: CancellationToken, callback: Callback) {
        let mut st = self.state.lock();
        let due = st.now + after;
        let seq = st.next_seq;
        st.next_seq += 1;
        st.timers.push(PendingTimer {
            due,
            seq,
            cancel,
            callback,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |label: &'static str| -> Callback {
            let l = Arc::clone(&l);
            Box::new(move || l.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_defer_waits_for_explicit_run() {
        let host = ManualHost::new();
        let (log, cb) = recorder();
        host.defer(cb("a"));
        host.defer(cb("b"));
        assert!(log.lock().is_empty());
        assert_eq!(host.run_until_idle(), 2);
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert!(!host.run_next());
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let host = ManualHost::new();
        let (log, cb) = recorder();
        host.start(Duration::from_secs(3), CancellationToken::new(), cb("late"));
        host.start(Duration::from_secs(1), CancellationToken::new(), cb("early"));

        assert_eq!(host.advance(Duration::from_secs(2)), 1);
        assert_eq!(*log.lock(), vec!["early"]);
        assert_eq!(host.now(), Duration::from_secs(2));

        assert_eq!(host.advance(Duration::from_secs(1)), 1);
        assert_eq!(*log.lock(), vec!["early", "late"]);
    }

    #[test]
    fn test_cancelled_timer_is_skipped() {
        let host = ManualHost::new();
        let (log, cb) = recorder();
        let token = CancellationToken::new();
        host.start(Duration::from_secs(1), token.clone(), cb("x"));
        assert_eq!(host.pending_timers(), 1);
        token.cancel();
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(host.advance(Duration::from_secs(5)), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_ticks_queued_by_timer_run_before_next_timer() {
        let host = ManualHost::new();
        let (log, cb) = recorder();
        let h = Arc::clone(&host);
        let tick = cb("tick");
        host.start(
            Duration::from_secs(1),
            CancellationToken::new(),
            Box::new(move || h.defer(tick)),
        );
        host.start(Duration::from_secs(2), CancellationToken::new(), cb("timer2"));
        host.advance(Duration::from_secs(2));
        assert_eq!(*log.lock(), vec!["tick", "timer2"]);
    }
}

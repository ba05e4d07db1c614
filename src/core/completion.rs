//! # Completion tracking and delivery futures.
//!
//! Every publish returns a [`DeliveryFuture`]. It resolves only once the bus knows
//! whether the event triggered further events in the same synchronous reaction
//! window, and if so, once those have been delivered too.
//!
//! ## Resolution after each tick
//! ```text
//! tick N delivered
//!   ├─► resolve futures carried over from tick N-1
//!   └─► pending queue empty?
//!         ├─ yes → resolve tick N futures now
//!         └─ no  → carry tick N futures to the end of tick N+1
//! ```
//!
//! Lookahead is exactly one tick: a chain A → B → C resolves A after B's tick,
//! not after C's.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::BusError;
use crate::events::Reply;

/// Internal resolution hook attached to one queued item.
pub(crate) enum Completion {
    /// Wakes a publisher awaiting a [`DeliveryFuture`].
    Notify(oneshot::Sender<()>),
    /// Runs bus-internal continuation logic (reply gathering).
    Then(Box<dyn FnOnce() + Send>),
}

impl Completion {
    pub(crate) fn channel() -> (Self, DeliveryFuture) {
        let (tx, rx) = oneshot::channel();
        (Completion::Notify(tx), DeliveryFuture { rx })
    }

    /// Must be called without holding bus locks.
    pub(crate) fn resolve(self) {
        match self {
            Completion::Notify(tx) => {
                let _ = tx.send(());
            }
            Completion::Then(f) => f(),
        }
    }
}

/// Futures awaiting the outcome of the previous tick.
#[derive(Default)]
pub(crate) struct CompletionTracker {
    carried: Vec<Completion>,
}

impl CompletionTracker {
    /// Decides the fate of one tick's completions.
    ///
    /// Returns the completions to resolve now; the caller resolves them after
    /// releasing the state lock.
    pub(crate) fn settle(&mut self, tick: Vec<Completion>, queue_drained: bool) -> Vec<Completion> {
        let mut ready = std::mem::take(&mut self.carried);
        if queue_drained {
            ready.extend(tick);
        } else {
            self.carried = tick;
        }
        ready
    }

    pub(crate) fn carried(&self) -> usize {
        self.carried.len()
    }
}

/// Completion handle returned by `Bus::publish`.
///
/// Resolves to `Ok(())` once delivery (and its one-tick cascade) is complete, or
/// `Err(BusError::Closed)` if the bus was torn down first.
#[derive(Debug)]
#[must_use = "dropping the future does not cancel delivery; ignore it explicitly"]
pub struct DeliveryFuture {
    rx: oneshot::Receiver<()>,
}

impl Future for DeliveryFuture {
    type Output = Result<(), BusError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| BusError::Closed))
    }
}

/// Completion handle returned by `Bus::request_and_gather`.
///
/// Resolves with the collected replies, or with [`BusError::ReplyTimeout`]
/// carrying the replies collected before the timeout.
#[derive(Debug)]
#[must_use = "the gathered replies are only observable through this future"]
pub struct GatherFuture {
    pub(crate) rx: oneshot::Receiver<Result<Vec<Reply>, BusError>>,
}

impl Future for GatherFuture {
    type Output = Result<Vec<Reply>, BusError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(BusError::Closed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_drained_queue_resolves_carried_and_current() {
        let mut tracker = CompletionTracker::default();
        let (a, mut fa) = Completion::channel();
        let (b, mut fb) = Completion::channel();

        for c in tracker.settle(vec![a], false) {
            c.resolve();
        }
        assert!((&mut fa).now_or_never().is_none());
        assert_eq!(tracker.carried(), 1);

        for c in tracker.settle(vec![b], true) {
            c.resolve();
        }
        assert!(matches!((&mut fa).now_or_never(), Some(Ok(()))));
        assert!(matches!((&mut fb).now_or_never(), Some(Ok(()))));
        assert_eq!(tracker.carried(), 0);
    }

    #[test]
    fn test_carried_futures_resolve_even_if_next_tick_carries() {
        let mut tracker = CompletionTracker::default();
        let (a, mut fa) = Completion::channel();
        let (b, mut fb) = Completion::channel();

        assert!(tracker.settle(vec![a], false).is_empty());
        let ready = tracker.settle(vec![b], false);
        assert_eq!(ready.len(), 1);
        ready.into_iter().for_each(Completion::resolve);

        assert!(matches!((&mut fa).now_or_never(), Some(Ok(()))));
        assert!((&mut fb).now_or_never().is_none());
    }

    #[test]
    fn test_then_runs_continuation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        Completion::Then(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }))
        .resolve();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_completion_reports_closed() {
        let (c, fut) = Completion::channel();
        drop(c);
        assert!(matches!(fut.now_or_never(), Some(Err(BusError::Closed))));
    }
}

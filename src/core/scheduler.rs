//! # Scheduler: ticks, cycles and delivery.
//!
//! Publishing never delivers synchronously. Items land in a pending queue; the first
//! item into an empty queue defers one tick onto the host. A tick takes the whole
//! queue as its batch, so items published while the tick runs form the next batch.
//!
//! ## Tick
//! ```text
//! run_tick()
//!   ├─► take batch (items + completions)
//!   ├─► mediator(items)            (outside locks)
//!   ├─► for each item:
//!   │     ├─► cycle id: inherited, or one fresh id shared by the tick
//!   │     ├─► activate cycle       (nested publishes inherit it)
//!   │     └─► deliver to matching subscribers, most specific first
//!   └─► settle completions         (resolved outside locks)
//! ```
//!
//! ## Rules
//! - A subscriber removed earlier in the same tick is skipped.
//! - A faulting handler (error or panic) is reported; remaining subscribers still run.
//! - The active cycle is tied to the thread running the tick; publishes from other
//!   threads start fresh cycles.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use super::bus::{Inner, Subscriber};
use super::completion::Completion;
use super::panic_message;
use crate::error::{ErrorDetails, HandlerError};
use crate::events::{EventItem, Materializer, Meta, Unsubscriber};
use crate::inspectors::{InspectAction, Inspection};

struct Queued {
    item: EventItem,
    completion: Completion,
}

struct ActiveCycle {
    id: u64,
    initiator: Option<Arc<str>>,
    thread: ThreadId,
}

impl ActiveCycle {
    fn is_current(&self) -> bool {
        self.thread == thread::current().id()
    }
}

/// Pending queue and cycle bookkeeping.
#[derive(Default)]
pub(crate) struct Scheduler {
    pending: Vec<Queued>,
    active: Option<ActiveCycle>,
    cycles: u64,
    last_cycle: Option<u64>,
}

impl Scheduler {
    /// Queues an item; returns `true` when the queue was empty (a tick must be deferred).
    fn push(&mut self, item: EventItem, completion: Completion) -> bool {
        let was_empty = self.pending.is_empty();
        self.pending.push(Queued { item, completion });
        was_empty
    }

    fn take_batch(&mut self) -> Vec<Queued> {
        std::mem::take(&mut self.pending)
    }

    fn next_cycle(&mut self) -> u64 {
        self.cycles += 1;
        self.cycles
    }

    fn activate(&mut self, id: u64, initiator: Option<Arc<str>>) {
        self.active = Some(ActiveCycle {
            id,
            initiator,
            thread: thread::current().id(),
        });
        self.last_cycle = Some(id);
    }

    fn deactivate(&mut self) {
        self.active = None;
    }

    /// Active cycle, if a delivery is in progress on the calling thread.
    fn active_here(&self) -> Option<&ActiveCycle> {
        self.active.as_ref().filter(|a| a.is_current())
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn last_cycle(&self) -> Option<u64> {
        self.last_cycle
    }
}

/// Clears the active cycle when a tick ends, including by unwinding out of a
/// hook (mediator, inspector, error handler).
struct CycleGuard<'a>(&'a Inner);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().scheduler.deactivate();
    }
}

impl Inner {
    /// Queues an item for the next tick.
    pub(crate) fn enqueue(self: &Arc<Self>, mut item: EventItem, completion: Completion) {
        let (record, schedule) = {
            let mut st = self.state.lock();
            if let Some(active) = st.scheduler.active_here() {
                item.parent_cycle = Some(active.id);
                item.initiator = active.initiator.clone();
            }
            let record = Inspection::new(InspectAction::Publish, Arc::clone(&item.topic))
                .with_source(item.options.sender.clone());
            (record, st.scheduler.push(item, completion))
        };
        self.inspect(record);

        if schedule {
            let bus = Arc::clone(self);
            self.defer.defer(Box::new(move || bus.run_tick()));
        }
    }

    pub(crate) fn run_tick(self: &Arc<Self>) {
        let batch = self.state.lock().scheduler.take_batch();
        let (items, completions): (Vec<EventItem>, Vec<Completion>) = batch
            .into_iter()
            .map(|q| (q.item, q.completion))
            .unzip();

        let items = self.mediate(items);
        tracing::trace!(events = items.len(), "bus tick");

        let guard = CycleGuard(self);
        let mut tick_cycle: Option<u64> = None;
        for item in items {
            let (cycle_id, subscribers) = {
                let mut st = self.state.lock();
                let cycle_id = match item.parent_cycle {
                    Some(id) => id,
                    None => *tick_cycle.get_or_insert_with(|| st.scheduler.next_cycle()),
                };
                st.scheduler.activate(cycle_id, item.initiator.clone());
                (cycle_id, st.tree.find(&item.topic))
            };
            self.deliver(&item, cycle_id, subscribers);
        }
        drop(guard);

        let ready = {
            let mut st = self.state.lock();
            let drained = st.scheduler.pending_len() == 0;
            st.completion.settle(completions, drained)
        };
        ready.into_iter().for_each(Completion::resolve);
    }

    fn deliver(self: &Arc<Self>, item: &EventItem, cycle_id: u64, subscribers: Vec<Subscriber>) {
        let mut materializer = Materializer::new(&item.payload);

        for sub in subscribers {
            if !item.options.deliver_to_sender && item.sender() == Some(&*sub.name) {
                continue;
            }
            if !self.state.lock().registry.contains(sub.handler_id, &sub.topic) {
                continue;
            }

            let payload = match materializer.materialize(sub.clone_mode) {
                Ok(payload) => payload,
                Err(e) => {
                    self.report(
                        &format!("payload copy for {} failed", sub.name),
                        ErrorDetails::PayloadCopy {
                            topic: Arc::clone(&item.topic),
                            subscriber: Arc::clone(&sub.name),
                            error: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            self.inspect(
                Inspection::new(InspectAction::Deliver, Arc::clone(&item.topic))
                    .with_source(item.options.sender.clone())
                    .with_target(Arc::clone(&sub.name))
                    .with_cycle(cycle_id)
                    .with_handler(sub.handler_id),
            );

            let meta = Meta::for_delivery(
                item,
                cycle_id,
                Unsubscriber::new(Arc::downgrade(self), sub.handler_id),
            );
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                sub.handler.on_event(payload, &meta)
            }))
            .unwrap_or_else(|panic| {
                Err(HandlerError::Panicked {
                    info: panic_message(&*panic),
                })
            });

            if let Err(error) = outcome {
                self.report(
                    &format!("handler {} failed on {}", sub.name, item.topic),
                    ErrorDetails::HandlerFault {
                        topic: Arc::clone(&item.topic),
                        sender: item.options.sender.clone(),
                        cycle_id,
                        subscriber: Arc::clone(&sub.name),
                        handler: sub.handler_id,
                        error,
                    },
                );
            }
        }
    }
}

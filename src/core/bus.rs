//! # Bus: public API and shared state.
//!
//! [`Bus`] is a cheap, cloneable handle over one shared [`Inner`]. All mutation goes
//! through two locks that are **never** held while user code (handlers, inspectors,
//! the error handler, the mediator) runs, so handlers may freely re-enter the bus.
//!
//! ## Architecture
//! ```text
//!                 ┌──────────────────────── Bus (Arc<Inner>) ─────────────────────────┐
//! subscribe ────► │ state: TopicTree ◄──► HandlerRegistry (handler → topics)          │
//! unsubscribe ──► │        Scheduler (pending queue, active cycle, cycle counter)     │
//! publish ──────► │        CompletionTracker (futures carried to the next tick)       │
//! request ──────► │ hooks: error handler, mediator, inspectors                        │
//!                 └───────────────┬───────────────────────────────────┬───────────────┘
//!                                 │ Defer::defer(tick)                │ Timer::start
//!                                 ▼                                   ▼
//!                            host worker ──► Inner::run_tick()   reply timeouts
//! ```
//!
//! ## Example
//! ```rust
//! use cyclebus::{Bus, BusConfig, HandlerFn, ManualHost, Meta, Payload, SubscribeOptions};
//! use futures::FutureExt;
//!
//! let host = ManualHost::new();
//! let bus = Bus::new(host.clone(), host.clone(), BusConfig::default());
//!
//! let printer = HandlerFn::arc("printer", |payload: Payload, meta: &Meta| {
//!     println!("[{}] {} = {}", meta.cycle_id, meta.topic, *payload);
//!     Ok(())
//! });
//! bus.subscribe("page", printer, SubscribeOptions::default()).unwrap();
//!
//! let done = bus.publish("page.open", serde_json::json!({"id": 7})).unwrap();
//! host.run_until_idle();
//! assert!(matches!(done.now_or_never(), Some(Ok(()))));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::completion::{Completion, CompletionTracker, DeliveryFuture, GatherFuture};
use super::config::BusConfig;
use super::registry::HandlerRegistry;
use super::scheduler::Scheduler;
use super::builder::BusBuilder;
use crate::error::{BusError, ErrorDetails};
use crate::events::{CloneMode, EventItem, PublishOptions, RequestOptions, SubscribeOptions};
use crate::handlers::{HandlerId, HandlerRef};
use crate::host::{Defer, Timer};
use crate::inspectors::{InspectAction, Inspect, Inspection, InspectorHandle};
use crate::topics::{self, TopicTree};

/// Receives `(message, details)` for every fault the bus cannot return to a caller.
pub type ErrorHandler = Arc<dyn Fn(&str, &ErrorDetails) + Send + Sync>;

/// Pre-dispatch batch transform, consulted once per tick.
pub type Mediator = Arc<dyn Fn(Vec<EventItem>) -> Vec<EventItem> + Send + Sync>;

/// Subscriber record stored in the topic tree.
#[derive(Clone)]
pub(crate) struct Subscriber {
    pub(crate) handler_id: HandlerId,
    pub(crate) handler: HandlerRef,
    pub(crate) name: Arc<str>,
    pub(crate) topic: Arc<str>,
    pub(crate) clone_mode: CloneMode,
}

pub(crate) struct State {
    pub(crate) tree: TopicTree<Subscriber>,
    pub(crate) registry: HandlerRegistry,
    pub(crate) scheduler: Scheduler,
    pub(crate) completion: CompletionTracker,
}

pub(crate) struct Hooks {
    error_handler: ErrorHandler,
    mediator: Option<Mediator>,
    inspectors: Vec<(u64, Arc<dyn Inspect>)>,
    next_inspector: u64,
}

/// Shared bus internals; every [`Bus`] clone points at one of these.
pub(crate) struct Inner {
    pub(crate) cfg: BusConfig,
    pub(crate) defer: Arc<dyn Defer>,
    pub(crate) timer: Arc<dyn Timer>,
    pub(crate) state: Mutex<State>,
    hooks: Mutex<Hooks>,
}

/// Default error handler: logs through `tracing`.
fn log_error(message: &str, details: &ErrorDetails) {
    tracing::error!(?details, "{message}");
}

impl Inner {
    pub(crate) fn new(defer: Arc<dyn Defer>, timer: Arc<dyn Timer>, cfg: BusConfig) -> Self {
        Self {
            cfg,
            defer,
            timer,
            state: Mutex::new(State {
                tree: TopicTree::default(),
                registry: HandlerRegistry::default(),
                scheduler: Scheduler::default(),
                completion: CompletionTracker::default(),
            }),
            hooks: Mutex::new(Hooks {
                error_handler: Arc::new(log_error),
                mediator: None,
                inspectors: Vec::new(),
                next_inspector: 0,
            }),
        }
    }

    pub(crate) fn subscribe(
        &self,
        topic: &str,
        handler: HandlerRef,
        opts: SubscribeOptions,
    ) -> Result<HandlerId, BusError> {
        topics::validate(topic)?;

        let (id, added) = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            let id = st.registry.id_of(&handler);

            if st.registry.contains(id, topic) {
                (id, None)
            } else {
                let topic: Arc<str> = topic.into();
                let name: Arc<str> = opts
                    .subscriber_name
                    .unwrap_or_else(|| handler.name().into());
                let record = st.tree.insert(
                    &topic,
                    Subscriber {
                        handler_id: id,
                        handler,
                        name: Arc::clone(&name),
                        topic: Arc::clone(&topic),
                        clone_mode: opts.clone_mode,
                    },
                );
                st.registry.push(id, Arc::clone(&topic), record);
                (id, Some((topic, name)))
            }
        };

        if let Some((topic, name)) = added {
            self.inspect(
                Inspection::new(InspectAction::Subscribe, topic)
                    .with_source(Some(name))
                    .with_handler(id),
            );
        }
        Ok(id)
    }

    pub(crate) fn unsubscribe(&self, id: HandlerId) {
        let removed: Vec<Subscriber> = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            st.registry
                .take(id)
                .into_iter()
                .filter_map(|reg| st.tree.remove(&reg.topic, reg.record))
                .collect()
        };

        for sub in removed {
            self.inspect(
                Inspection::new(InspectAction::Unsubscribe, sub.topic)
                    .with_source(Some(sub.name))
                    .with_handler(id),
            );
        }
    }

    /// Notifies every inspector. Must be called without holding bus locks.
    pub(crate) fn inspect(&self, record: Inspection) {
        let inspectors: Vec<Arc<dyn Inspect>> = {
            let hooks = self.hooks.lock();
            if hooks.inspectors.is_empty() {
                return;
            }
            hooks.inspectors.iter().map(|(_, i)| Arc::clone(i)).collect()
        };
        for inspector in inspectors {
            inspector.inspect(&record);
        }
    }

    /// Forwards a fault to the error handler. Must be called without holding bus locks.
    pub(crate) fn report(&self, message: &str, details: ErrorDetails) {
        let handler = Arc::clone(&self.hooks.lock().error_handler);
        handler(message, &details);
    }

    /// Runs the mediator over a batch (identity when none is set).
    pub(crate) fn mediate(&self, batch: Vec<EventItem>) -> Vec<EventItem> {
        let mediator = self.hooks.lock().mediator.clone();
        match mediator {
            Some(mediator) => mediator(batch),
            None => batch,
        }
    }

    pub(crate) fn add_inspector(&self, inspector: Arc<dyn Inspect>) -> u64 {
        let mut hooks = self.hooks.lock();
        let id = hooks.next_inspector;
        hooks.next_inspector += 1;
        hooks.inspectors.push((id, inspector));
        id
    }

    pub(crate) fn remove_inspector(&self, id: u64) -> bool {
        let mut hooks = self.hooks.lock();
        let before = hooks.inspectors.len();
        hooks.inspectors.retain(|(i, _)| *i != id);
        hooks.inspectors.len() != before
    }

    pub(crate) fn set_error_handler(&self, handler: ErrorHandler) {
        self.hooks.lock().error_handler = handler;
    }

    pub(crate) fn set_mediator(&self, mediator: Option<Mediator>) {
        self.hooks.lock().mediator = mediator;
    }
}

/// In-process topic bus.
///
/// Cloning is cheap; all clones share subscriptions, queue and hooks.
#[derive(Clone)]
pub struct Bus {
    pub(crate) inner: Arc<Inner>,
}

impl Bus {
    /// Creates a bus on explicit host ports.
    ///
    /// `defer` schedules ticks, `timer` schedules reply timeouts. Passing the same
    /// [`ManualHost`](crate::ManualHost) or [`TokioHost`](crate::TokioHost) for both is the
    /// common case.
    pub fn new(defer: Arc<dyn Defer>, timer: Arc<dyn Timer>, cfg: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner::new(defer, timer, cfg)),
        }
    }

    /// Starts a [`BusBuilder`].
    pub fn builder(cfg: BusConfig) -> BusBuilder {
        BusBuilder::new(cfg)
    }

    /// Configuration this bus was created with.
    pub fn config(&self) -> &BusConfig {
        &self.inner.cfg
    }

    /// Subscribes `handler` to `topic`.
    ///
    /// Returns the handler's id. Subscribing the same handler allocation again
    /// (to any topic) returns the same id; subscribing it twice to the same topic
    /// is a no-op.
    ///
    /// # Errors
    /// [`BusError::InvalidTopic`] for topics containing whitespace or control characters.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: HandlerRef,
        opts: SubscribeOptions,
    ) -> Result<HandlerId, BusError> {
        self.inner.subscribe(topic, handler, opts)
    }

    /// Removes every registration of a handler. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: HandlerId) {
        self.inner.unsubscribe(id);
    }

    /// Publishes an event with default options.
    ///
    /// See [`Bus::publish_with`].
    pub fn publish(&self, topic: &str, payload: impl Serialize) -> Result<DeliveryFuture, BusError> {
        self.publish_with(topic, payload, PublishOptions::default())
    }

    /// Publishes an event.
    ///
    /// The event is delivered in a later tick; the returned future resolves once
    /// delivery and its one-tick cascade are complete.
    ///
    /// # Errors
    /// - [`BusError::InvalidTopic`] for topics containing whitespace or control characters
    /// - [`BusError::Payload`] if `payload` cannot be represented as JSON
    pub fn publish_with(
        &self,
        topic: &str,
        payload: impl Serialize,
        opts: PublishOptions,
    ) -> Result<DeliveryFuture, BusError> {
        topics::validate(topic)?;
        let payload = serde_json::to_value(payload)?;
        let (completion, future) = Completion::channel();
        self.inner
            .enqueue(EventItem::with_options(topic, payload, opts), completion);
        Ok(future)
    }

    /// Publishes a `<verb>Request` event and gathers `did<Verb>` replies.
    ///
    /// Responders that publish `will<Verb>` are awaited until they publish
    /// `did<Verb>` or the reply timeout elapses.
    ///
    /// # Errors
    /// - [`BusError::MalformedRequestTopic`] if `topic` is not a request topic (also
    ///   reported to the error handler)
    /// - [`BusError::InvalidTopic`], [`BusError::Payload`] as for [`Bus::publish_with`]
    pub fn request_and_gather(
        &self,
        topic: &str,
        payload: impl Serialize,
        opts: RequestOptions,
    ) -> Result<GatherFuture, BusError> {
        self.inner.request_and_gather(topic, payload, opts)
    }

    /// Replaces the error handler.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &ErrorDetails) + Send + Sync + 'static,
    {
        self.inner.set_error_handler(Arc::new(handler));
    }

    /// Restores the default `tracing` error handler.
    pub fn reset_error_handler(&self) {
        self.inner.set_error_handler(Arc::new(log_error));
    }

    /// Installs a mediator that may insert, remove or reorder each tick's batch.
    ///
    /// Futures of removed items still resolve with their tick.
    pub fn set_mediator<F>(&self, mediator: F)
    where
        F: Fn(Vec<EventItem>) -> Vec<EventItem> + Send + Sync + 'static,
    {
        self.inner.set_mediator(Some(Arc::new(mediator)));
    }

    /// Removes the mediator (identity batches again).
    pub fn clear_mediator(&self) {
        self.inner.set_mediator(None);
    }

    /// Registers an inspector.
    pub fn add_inspector(&self, inspector: impl Inspect) -> InspectorHandle {
        let id = self.inner.add_inspector(Arc::new(inspector));
        InspectorHandle {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Topics a handler is registered under, in registration order.
    pub fn topics_of(&self, id: HandlerId) -> Vec<Arc<str>> {
        self.inner.state.lock().registry.topics_of(id)
    }

    /// Total number of (handler, topic) registrations.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().tree.len()
    }

    /// Number of distinct subscribed handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.state.lock().registry.len()
    }

    /// Events waiting for the next tick.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().scheduler.pending_len()
    }

    /// Most recently activated cycle id, if any event was delivered yet.
    pub fn last_cycle_id(&self) -> Option<u64> {
        self.inner.state.lock().scheduler.last_cycle()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.lock();
        f.debug_struct("Bus")
            .field("subscriptions", &st.tree.len())
            .field("handlers", &st.registry.len())
            .field("pending", &st.scheduler.pending_len())
            .field("carried", &st.completion.carried())
            .finish()
    }
}

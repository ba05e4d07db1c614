//! # Queued event items and delivery metadata.
//!
//! [`EventItem`] is what the scheduler queues for a tick (and what a mediator sees);
//! [`Meta`] is what a handler receives next to the payload.
//!
//! ## Cycle ids
//! `cycle_id` is assigned once, when the item begins delivery:
//! - items published outside any delivery share one fresh id per tick;
//! - items published from inside a handler inherit the cycle of the event being
//!   delivered, so a whole synchronous reaction chain reports the same cycle.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;

use super::payload::CloneMode;
use crate::core::Inner;
use crate::handlers::HandlerId;

/// Per-publish options.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Logical sender name; compared to subscriber names for `deliver_to_sender`.
    pub sender: Option<Arc<str>>,
    /// When `false`, subscribers whose name equals `sender` are skipped.
    pub deliver_to_sender: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            sender: None,
            deliver_to_sender: true,
        }
    }
}

impl PublishOptions {
    /// Sets the sender name.
    #[inline]
    pub fn with_sender(mut self, sender: impl Into<Arc<str>>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Controls delivery to subscribers named like the sender.
    #[inline]
    pub fn deliver_to_sender(mut self, deliver: bool) -> Self {
        self.deliver_to_sender = deliver;
        self
    }
}

/// Per-subscription options.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Overrides [`Handler::name`](crate::Handler::name) as the subscriber name.
    pub subscriber_name: Option<Arc<str>>,
    /// Payload delivery mode.
    pub clone_mode: CloneMode,
}

impl SubscribeOptions {
    /// Sets the subscriber name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.subscriber_name = Some(name.into());
        self
    }

    /// Sets the payload delivery mode.
    #[inline]
    pub fn with_clone_mode(mut self, mode: CloneMode) -> Self {
        self.clone_mode = mode;
        self
    }
}

/// Per-request options for `Bus::request_and_gather`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Sender of the request event.
    pub sender: Option<Arc<str>>,
    /// Overrides `BusConfig::pending_did_timeout` for this call.
    pub pending_did_timeout: Option<Duration>,
}

impl RequestOptions {
    /// Sets the sender name.
    #[inline]
    pub fn with_sender(mut self, sender: impl Into<Arc<str>>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Overrides the reply timeout.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.pending_did_timeout = Some(timeout);
        self
    }
}

/// An event waiting in the scheduler queue.
///
/// Mediators receive and return these; use [`EventItem::new`] to inject new ones.
#[derive(Debug, Clone)]
pub struct EventItem {
    /// Published topic.
    pub topic: Arc<str>,
    /// Payload shared by all deliveries of this item.
    pub payload: Arc<Value>,
    /// Publish options (sender, deliver-to-sender).
    pub options: PublishOptions,
    /// Sender of the first event of the causal chain.
    pub initiator: Option<Arc<str>>,
    pub(crate) parent_cycle: Option<u64>,
}

impl EventItem {
    /// Creates a top-level item (it opens or joins the tick's own cycle).
    pub fn new(topic: impl Into<Arc<str>>, payload: Value) -> Self {
        Self::with_options(topic, payload, PublishOptions::default())
    }

    /// Creates a top-level item with explicit options.
    pub fn with_options(topic: impl Into<Arc<str>>, payload: Value, options: PublishOptions) -> Self {
        Self {
            topic: topic.into(),
            payload: Arc::new(payload),
            initiator: options.sender.clone(),
            options,
            parent_cycle: None,
        }
    }

    /// Sender of this item.
    #[inline]
    pub fn sender(&self) -> Option<&str> {
        self.options.sender.as_deref()
    }

    /// Cycle this item inherits, if it was published from inside a delivery.
    #[inline]
    pub fn inherited_cycle(&self) -> Option<u64> {
        self.parent_cycle
    }
}

/// Metadata passed to a handler next to the payload.
#[derive(Clone)]
pub struct Meta {
    /// Published topic.
    pub topic: Arc<str>,
    /// Cycle the event is delivered in.
    pub cycle_id: u64,
    /// Sender of this event.
    pub sender: Option<Arc<str>>,
    /// Sender of the first event of the causal chain.
    pub initiator: Option<Arc<str>>,
    /// Publish options the event was sent with.
    pub options: PublishOptions,
    pub(crate) unsubscriber: Option<Unsubscriber>,
}

impl Meta {
    pub(crate) fn for_delivery(item: &EventItem, cycle_id: u64, unsubscriber: Unsubscriber) -> Self {
        Self {
            topic: Arc::clone(&item.topic),
            cycle_id,
            sender: item.options.sender.clone(),
            initiator: item.initiator.clone(),
            options: item.options.clone(),
            unsubscriber: Some(unsubscriber),
        }
    }

    /// Removes the handler currently being invoked from all of its registrations.
    ///
    /// No-op on detached metadata (for example inside a [`Reply`]).
    pub fn unsubscribe(&self) {
        if let Some(unsub) = &self.unsubscriber {
            unsub.run();
        }
    }

    /// Copy of this metadata without the unsubscribe hook.
    pub fn detached(&self) -> Self {
        Self {
            unsubscriber: None,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("topic", &self.topic)
            .field("cycle_id", &self.cycle_id)
            .field("sender", &self.sender)
            .field("initiator", &self.initiator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Hook that removes one handler from the bus it was delivered by.
#[derive(Clone)]
pub(crate) struct Unsubscriber {
    bus: Weak<Inner>,
    handler: HandlerId,
}

impl Unsubscriber {
    pub(crate) fn new(bus: Weak<Inner>, handler: HandlerId) -> Self {
        Self { bus, handler }
    }

    fn run(&self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.unsubscribe(self.handler);
        }
    }
}

/// One `did...` reply collected by `request_and_gather`.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Reply payload.
    pub payload: Arc<Value>,
    /// Reply metadata (detached).
    pub meta: Meta,
}

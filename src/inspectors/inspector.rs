//! # Inspector: observability taps
//!
//! The [`Inspect`] trait lets users watch what the bus does without being able to
//! change it. Inspectors are notified of four actions:
//!
//! | Action        | source            | target          | cycle_id |
//! |---------------|-------------------|-----------------|----------|
//! | `Subscribe`   | subscriber name   | –               | –        |
//! | `Unsubscribe` | subscriber name   | –               | –        |
//! | `Publish`     | sender            | –               | –        |
//! | `Deliver`     | sender            | subscriber name | assigned |
//!
//! Closures `Fn(&Inspection)` implement [`Inspect`] directly.
//!
//! # Example
//! ```rust
//! use cyclebus::{Bus, BusConfig, InspectAction, Inspection, ManualHost};
//!
//! let host = ManualHost::new();
//! let bus = Bus::new(host.clone(), host.clone(), BusConfig::default());
//! let handle = bus.add_inspector(|record: &Inspection| {
//!     if record.action == InspectAction::Deliver {
//!         println!("{} -> {:?}", record.topic, record.target);
//!     }
//! });
//! handle.revoke();
//! ```

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::core::Inner;
use crate::handlers::HandlerId;

/// Kind of bus action being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectAction {
    /// A handler registered a topic.
    Subscribe,
    /// A handler registration was removed.
    Unsubscribe,
    /// An event was enqueued.
    Publish,
    /// An event was handed to one subscriber.
    Deliver,
}

impl InspectAction {
    /// Short stable label (snake_case).
    pub fn as_label(self) -> &'static str {
        match self {
            InspectAction::Subscribe => "subscribe",
            InspectAction::Unsubscribe => "unsubscribe",
            InspectAction::Publish => "publish",
            InspectAction::Deliver => "deliver",
        }
    }
}

/// Structured record of one bus action.
#[derive(Debug, Clone)]
pub struct Inspection {
    /// What happened.
    pub action: InspectAction,
    /// Acting party (sender or subscriber name).
    pub source: Option<Arc<str>>,
    /// Receiving subscriber (deliveries only).
    pub target: Option<Arc<str>>,
    /// Topic involved.
    pub topic: Arc<str>,
    /// Delivery cycle (deliveries only).
    pub cycle_id: Option<u64>,
    /// Handler involved (subscribe, unsubscribe, deliver).
    pub handler: Option<HandlerId>,
}

impl Inspection {
    pub(crate) fn new(action: InspectAction, topic: Arc<str>) -> Self {
        Self {
            action,
            source: None,
            target: None,
            topic,
            cycle_id: None,
            handler: None,
        }
    }

    #[inline]
    pub(crate) fn with_source(mut self, source: Option<Arc<str>>) -> Self {
        self.source = source;
        self
    }

    #[inline]
    pub(crate) fn with_target(mut self, target: Arc<str>) -> Self {
        self.target = Some(target);
        self
    }

    #[inline]
    pub(crate) fn with_cycle(mut self, cycle_id: u64) -> Self {
        self.cycle_id = Some(cycle_id);
        self
    }

    #[inline]
    pub(crate) fn with_handler(mut self, handler: HandlerId) -> Self {
        self.handler = Some(handler);
        self
    }
}

/// Trait for observing bus actions.
pub trait Inspect: Send + Sync + 'static {
    /// Called for every reported action.
    fn inspect(&self, record: &Inspection);
}

impl<F> Inspect for F
where
    F: Fn(&Inspection) + Send + Sync + 'static,
{
    fn inspect(&self, record: &Inspection) {
        self(record)
    }
}

/// Revocation handle returned by `Bus::add_inspector`.
///
/// Dropping the handle keeps the inspector registered; call [`InspectorHandle::revoke`].
#[derive(Debug)]
pub struct InspectorHandle {
    pub(crate) bus: Weak<Inner>,
    pub(crate) id: u64,
}

impl InspectorHandle {
    /// Removes the inspector. Returns `false` if it was already gone.
    pub fn revoke(self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|inner| inner.remove_inspector(self.id))
    }
}

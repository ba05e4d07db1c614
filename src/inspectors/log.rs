//! # LogWriter: simple action logger
//!
//! A minimal inspector that writes every bus action through `tracing`.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO [subscribe] subscriber="menu" topic="willNavigate"
//! INFO [publish] sender="router" topic="willNavigate.home"
//! INFO [deliver] sender="router" subscriber="menu" topic="willNavigate.home" cycle=4
//! INFO [unsubscribe] subscriber="menu" topic="willNavigate"
//! ```

use crate::inspectors::{InspectAction, Inspect, Inspection};

/// Inspector that logs each action at `INFO`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Inspect for LogWriter {
    fn inspect(&self, r: &Inspection) {
        let topic = &*r.topic;
        match r.action {
            InspectAction::Subscribe => {
                tracing::info!(subscriber = ?r.source, topic, "[subscribe]");
            }
            InspectAction::Unsubscribe => {
                tracing::info!(subscriber = ?r.source, topic, "[unsubscribe]");
            }
            InspectAction::Publish => {
                tracing::info!(sender = ?r.source, topic, "[publish]");
            }
            InspectAction::Deliver => {
                tracing::info!(
                    sender = ?r.source,
                    subscriber = ?r.target,
                    topic,
                    cycle = ?r.cycle_id,
                    "[deliver]"
                );
            }
        }
    }
}

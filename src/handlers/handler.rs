//! # Core handler trait
//!
//! `Handler` is the extension point for reacting to published events. Handlers are
//! invoked synchronously from the bus tick worker, one at a time, most specific
//! subscription first.
//!
//! ## Contract
//! - Handlers run to completion; there is no preemption inside a tick.
//! - A handler may publish, subscribe or unsubscribe re-entrantly. Events it publishes
//!   are delivered in a **later** tick, never appended to the running batch.
//! - Returning `Err` or panicking is reported to the bus error handler and does not
//!   affect the remaining subscribers.
//!
//! ## Example
//! ```rust
//! use cyclebus::{Handler, HandlerError, Meta, Payload};
//!
//! struct Audit;
//!
//! impl Handler for Audit {
//!     fn on_event(&self, payload: Payload, meta: &Meta) -> Result<(), HandlerError> {
//!         println!("{} @{}: {}", meta.topic, meta.cycle_id, *payload);
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::events::{Meta, Payload};

/// Contract for event handlers.
pub trait Handler: Send + Sync + 'static {
    /// Handle a single delivered event.
    ///
    /// # Parameters
    /// - `payload`: private copy or shared frozen view, depending on the subscription's
    ///   [`CloneMode`](crate::CloneMode)
    /// - `meta`: topic, cycle, sender and the `unsubscribe` hook
    fn on_event(&self, payload: Payload, meta: &Meta) -> Result<(), HandlerError>;

    /// Human-readable name (for logs and sender matching).
    ///
    /// Used as the subscriber name unless `SubscribeOptions::with_name` overrides it.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a handler.
///
/// Handler identity is the allocation behind this `Arc`: subscribing clones of the
/// same `HandlerRef` to several topics yields one [`HandlerId`].
pub type HandlerRef = Arc<dyn Handler>;

/// Opaque token identifying a subscribed handler.
///
/// Returned by `Bus::subscribe`; pass it to `Bus::unsubscribe` to remove every
/// registration of that handler at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub(crate) u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

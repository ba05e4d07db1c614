//! Event data model: queued items, delivery metadata and payload views.
//!
//! ## Contents
//! - [`EventItem`] queued event (what the mediator sees)
//! - [`Meta`] metadata delivered next to the payload
//! - [`Payload`], [`CloneMode`] private copy vs shared frozen view
//! - [`PublishOptions`], [`SubscribeOptions`], [`RequestOptions`] per-call knobs
//! - [`Reply`] one collected `did...` reply

mod item;
mod payload;

pub use item::{EventItem, Meta, PublishOptions, Reply, RequestOptions, SubscribeOptions};
pub use payload::{CloneMode, Payload};

pub(crate) use item::Unsubscriber;
pub(crate) use payload::Materializer;

//! # Event handlers.
//!
//! This module provides the [`Handler`] trait and the closure-backed [`HandlerFn`].
//!
//! ## Architecture
//! ```text
//! publish(topic) ──► Bus tick ──► TopicTree::find(topic)
//!                                     │  (most specific first)
//!                                     ├──► handler_1.on_event(payload, meta)
//!                                     ├──► handler_2.on_event(payload, meta)
//!                                     └──► handler_N.on_event(payload, meta)
//! ```
//!
//! A handler is identified by its `Arc` allocation; the bus hands out a
//! [`HandlerId`] on first subscription and keeps the handler→topics side table
//! keyed by that id.

mod handler;
mod handler_fn;

pub use handler::{Handler, HandlerId, HandlerRef};
pub use handler_fn::HandlerFn;

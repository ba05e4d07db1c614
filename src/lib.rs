//! # cyclebus
//!
//! **cyclebus** is an in-process topic publish/subscribe bus for Rust.
//!
//! Components talk to each other by publishing events on dotted topics
//! (`willNavigate.home`). Delivery is asynchronous, batched into ticks, ordered
//! from the most specific subscription to the least specific, and traced through
//! causal cycles. On top of plain publish the bus offers a request/will/did
//! protocol for gathering replies from an unknown set of responders.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!   │ component A │   │ component B │   │ component C │
//!   └──┬───────▲──┘   └──┬───────▲──┘   └──┬───────▲──┘
//!      │publish│deliver  │       │         │       │
//!      ▼       │         ▼       │         ▼       │
//! ┌────────────┴─────────────────┴─────────────────┴───────────────┐
//! │  Bus                                                           │
//! │  - TopicTree (segments, `-` subtopics, empty-segment wildcard) │
//! │  - HandlerRegistry (handler identity → topics)                 │
//! │  - Scheduler (pending queue, cycles, mediator, delivery)       │
//! │  - CompletionTracker (one-tick lookahead futures)              │
//! │  - hooks: error handler, inspectors                            │
//! └──────────────┬──────────────────────────────────┬──────────────┘
//!                ▼ Defer::defer(tick)               ▼ Timer::start(timeout)
//!        ┌───────────────────────────────────────────────────┐
//!        │  host: TokioHost (worker task) or ManualHost      │
//!        └───────────────────────────────────────────────────┘
//! ```
//!
//! ### Topic matching
//! ```text
//! published:  willNavigate.home-page.top
//! matches:    willNavigate.home-page.top   weight (3, 1)
//!             willNavigate.home-page       weight (2, 1)
//!             willNavigate.home            weight (2, 0)  `home-page` falls back to `home`
//!             willNavigate..top            weight (2, 0)  empty segment = any
//!             willNavigate                 weight (1, 0)
//! delivery order: higher weight first, ties in registration order
//! ```
//!
//! ### Tick
//! ```text
//! publish(e1), publish(e2) ──► [pending] ──defer──► tick
//!   tick: mediator(batch) ─► deliver e1, e2 (cycle N)
//!         handlers publish e3 (inherits cycle N) ─► next tick
//!   futures of e1, e2 resolve after e3's tick
//! ```
//!
//! ## Features
//! | Area               | Description                                                     | Key types / traits                           |
//! |--------------------|-----------------------------------------------------------------|----------------------------------------------|
//! | **Bus**            | Subscribe, publish, unsubscribe, delivery futures.              | [`Bus`], [`DeliveryFuture`]                  |
//! | **Handlers**       | Implement a trait or wrap a closure.                            | [`Handler`], [`HandlerFn`], [`HandlerRef`]   |
//! | **Requests**       | `<verb>Request` → `will<Verb>` / `did<Verb>` reply gathering.   | [`Bus::request_and_gather`], [`GatherFuture`]|
//! | **Hooks**          | Error handler, batch mediator, inspectors.                      | [`ErrorDetails`], [`Inspect`]                |
//! | **Hosts**          | Where ticks and timers run.                                     | [`TokioHost`], [`ManualHost`]                |
//! | **Errors**         | Typed errors for callers and handlers.                          | [`BusError`], [`HandlerError`]               |
//! | **Configuration**  | Bus-wide defaults.                                              | [`BusConfig`]                                |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] inspector _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use cyclebus::{Bus, BusConfig, HandlerFn, Meta, Payload, PublishOptions, RequestOptions, SubscribeOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = BusConfig::default();
//!     cfg.pending_did_timeout = Duration::from_secs(5);
//!
//!     let bus = Bus::builder(cfg).build()?;
//!
//!     // A responder that answers a save request right away.
//!     let responder = {
//!         let bus = bus.clone();
//!         HandlerFn::arc("store", move |_payload: Payload, _meta: &Meta| {
//!             let opts = PublishOptions::default().with_sender("store");
//!             let _ = bus.publish_with("didSave", "saved", opts);
//!             Ok(())
//!         })
//!     };
//!     bus.subscribe("saveRequest", responder, SubscribeOptions::default())?;
//!
//!     let replies = bus
//!         .request_and_gather("saveRequest", serde_json::json!({"doc": 1}), RequestOptions::default())?
//!         .await?;
//!     assert_eq!(replies.len(), 1);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod handlers;
mod host;
mod inspectors;
pub mod topics;

// ---- Public re-exports ----

pub use core::{Bus, BusBuilder, BusConfig, DeliveryFuture, ErrorHandler, GatherFuture, Mediator};
pub use error::{BusError, ErrorDetails, HandlerError};
pub use events::{
    CloneMode, EventItem, Meta, Payload, PublishOptions, Reply, RequestOptions, SubscribeOptions,
};
pub use handlers::{Handler, HandlerFn, HandlerId, HandlerRef};
pub use host::{Callback, Defer, ManualHost, Timer, TokioHost};
pub use inspectors::{InspectAction, Inspect, Inspection, InspectorHandle};
pub use topics::{RequestTopic, VisibilityArea, Weight};

// Optional: expose a simple built-in logging inspector (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use inspectors::LogWriter;

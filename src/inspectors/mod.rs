//! # Instrumentation inspectors.
//!
//! Inspectors receive an [`Inspection`] for every subscribe, unsubscribe, publish and
//! deliver action. They observe only; nothing they do changes delivery.
//!
//! Provided implementations:
//! - [`LogWriter`] (enabled via `logging` feature) → logs actions through `tracing`

mod inspector;
#[cfg(feature = "logging")]
mod log;

pub use inspector::{InspectAction, Inspect, Inspection, InspectorHandle};
#[cfg(feature = "logging")]
pub use log::LogWriter;

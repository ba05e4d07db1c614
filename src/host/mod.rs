//! Host scheduling ports and the two shipped hosts.
//!
//! ## Contents
//! - [`Defer`], [`Timer`] ports the bus is constructed with
//! - [`TokioHost`] single worker task on a Tokio runtime
//! - [`ManualHost`] deterministic, manually advanced host for tests and custom loops
//!
//! The bus suspends **only** at these two ports: between `enqueue` and the tick that
//! delivers, and between arming a reply timeout and its expiry.

mod manual;
mod port;
mod tokio_host;

pub use manual::ManualHost;
pub use port::{Callback, Defer, Timer};
pub use tokio_host::TokioHost;

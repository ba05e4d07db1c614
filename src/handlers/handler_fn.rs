//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(Payload, &Meta) -> Result<(), HandlerError>`
//! together with a stable name.
//!
//! ## Example
//! ```rust
//! use cyclebus::{HandlerFn, HandlerRef, Meta, Payload};
//!
//! let h: HandlerRef = HandlerFn::arc("printer", |payload: Payload, meta: &Meta| {
//!     println!("{} -> {}", meta.topic, *payload);
//!     Ok(())
//! });
//!
//! assert_eq!(h.name(), "printer");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::events::{Meta, Payload};
use crate::handlers::handler::Handler;

/// Function-backed handler implementation.
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F>
where
    F: Fn(Payload, &Meta) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](crate::HandlerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(Payload, &Meta) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn on_event(&self, payload: Payload, meta: &Meta) -> Result<(), HandlerError> {
        (self.f)(payload, meta)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

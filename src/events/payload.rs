//! # Payload delivery modes.
//!
//! Every subscription picks a [`CloneMode`]:
//! - [`CloneMode::Frozen`] (default): all frozen subscribers share one `Arc<Value>`.
//!   The view is read-only all the way down; [`Payload::get_mut`] returns `None`.
//! - [`CloneMode::Clone`]: each subscriber gets a private deep copy it may mutate.
//!   The copy is produced by a structural round trip through the JSON encoder; the
//!   encoding is computed once per event and decoded once per clone subscriber.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a subscriber receives the event payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneMode {
    /// Shared, immutable view.
    #[default]
    Frozen,
    /// Private deep copy.
    Clone,
}

/// Payload as handed to one handler invocation.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Private copy owned by this invocation.
    Owned(Value),
    /// Frozen view shared with other subscribers of the same event.
    Shared(Arc<Value>),
}

impl Payload {
    /// Mutable access to a private copy.
    ///
    /// Returns `None` for a shared frozen view: mutation is rejected.
    pub fn get_mut(&mut self) -> Option<&mut Value> {
        match self {
            Payload::Owned(value) => Some(value),
            Payload::Shared(_) => None,
        }
    }

    /// Whether this is the shared frozen view.
    pub fn is_shared(&self) -> bool {
        matches!(self, Payload::Shared(_))
    }

    /// Takes the value, copying it if it is shared.
    pub fn into_owned(self) -> Value {
        match self {
            Payload::Owned(value) => value,
            Payload::Shared(shared) => Value::clone(&shared),
        }
    }

    /// Converts into a shared handle without copying a frozen view.
    pub fn into_shared(self) -> Arc<Value> {
        match self {
            Payload::Owned(value) => Arc::new(value),
            Payload::Shared(shared) => shared,
        }
    }
}

impl Deref for Payload {
    type Target = Value;

    fn deref(&self) -> &Value {
        match self {
            Payload::Owned(value) => value,
            Payload::Shared(shared) => shared,
        }
    }
}

/// Produces per-subscriber payloads for one event.
pub(crate) struct Materializer<'a> {
    source: &'a Arc<Value>,
    encoded: Option<Vec<u8>>,
}

impl<'a> Materializer<'a> {
    pub(crate) fn new(source: &'a Arc<Value>) -> Self {
        Self {
            source,
            encoded: None,
        }
    }

    pub(crate) fn materialize(&mut self, mode: CloneMode) -> Result<Payload, serde_json::Error> {
        match mode {
            CloneMode::Frozen => Ok(Payload::Shared(Arc::clone(self.source))),
            CloneMode::Clone => {
                if self.encoded.is_none() {
                    self.encoded = Some(serde_json::to_vec(self.source.as_ref())?);
                }
                let bytes = self.encoded.as_deref().unwrap_or_default();
                Ok(Payload::Owned(serde_json::from_slice(bytes)?))
            }
        }
    }
}

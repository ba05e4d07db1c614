//! # Handler registry - handler→topics side table.
//!
//! The topic tree answers "who listens to this topic"; the registry answers the
//! reverse question so a handler can be removed from every topic in one call.
//!
//! ## Architecture
//! ```text
//! subscribe(topic, handler) ──► id_of(handler) ──► HandlerId
//!                                   │
//!                                   ├─► TopicTree::insert(topic) ─► RecordId
//!                                   └─► push(id, topic, RecordId)
//!
//! unsubscribe(id) ──► take(id) ──► [(topic, RecordId), ...] ──► TopicTree::remove
//! ```
//!
//! ## Rules
//! - Identity is the handler's `Arc` allocation; the entry keeps a clone, so the
//!   address cannot be reused while the handler is registered.
//! - An entry is created on first subscribe and dropped on unsubscribe.
//! - A (handler, topic) pair is registered at most once.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handlers::{HandlerId, HandlerRef};
use crate::topics::RecordId;

/// One topic registration of a handler.
#[derive(Debug, Clone)]
pub(crate) struct Registration {
    pub(crate) topic: Arc<str>,
    pub(crate) record: RecordId,
}

struct Entry {
    handler: HandlerRef,
    registrations: Vec<Registration>,
}

/// Side table from handler identity to its registrations.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    by_id: HashMap<HandlerId, Entry>,
    by_addr: HashMap<usize, HandlerId>,
    next_id: u64,
}

fn addr_of(handler: &HandlerRef) -> usize {
    Arc::as_ptr(handler).cast::<()>() as usize
}

impl HandlerRegistry {
    /// Returns the id for `handler`, creating an empty entry on first sight.
    pub(crate) fn id_of(&mut self, handler: &HandlerRef) -> HandlerId {
        let addr = addr_of(handler);
        if let Some(id) = self.by_addr.get(&addr) {
            return *id;
        }

        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.by_addr.insert(addr, id);
        self.by_id.insert(
            id,
            Entry {
                handler: Arc::clone(handler),
                registrations: Vec::new(),
            },
        );
        id
    }

    /// Whether `id` is already registered under exactly `topic`.
    pub(crate) fn contains(&self, id: HandlerId, topic: &str) -> bool {
        self.by_id
            .get(&id)
            .is_some_and(|e| e.registrations.iter().any(|r| &*r.topic == topic))
    }

    pub(crate) fn push(&mut self, id: HandlerId, topic: Arc<str>, record: RecordId) {
        if let Some(entry) = self.by_id.get_mut(&id) {
            entry.registrations.push(Registration { topic, record });
        }
    }

    /// Removes the entry for `id` and returns its registrations.
    pub(crate) fn take(&mut self, id: HandlerId) -> Vec<Registration> {
        match self.by_id.remove(&id) {
            Some(entry) => {
                self.by_addr.remove(&addr_of(&entry.handler));
                entry.registrations
            }
            None => Vec::new(),
        }
    }

    /// Topics `id` is registered under, in registration order.
    pub(crate) fn topics_of(&self, id: HandlerId) -> Vec<Arc<str>> {
        self.by_id
            .get(&id)
            .map(|e| e.registrations.iter().map(|r| Arc::clone(&r.topic)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }
}

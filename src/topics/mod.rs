//! Topic grammar, specificity weights and the subscription trie.
//!
//! ## Contents
//! - [`Weight`] specificity used to order delivery
//! - [`RequestTopic`] request/will/did grammar
//! - `TopicTree` (internal) segment trie with wildcard and subtopic lookup
//! - [`conventions`] topic builders for lifecycle, navigation and visibility

pub mod conventions;
mod topic;
mod tree;

pub use conventions::{RequestTopic, VisibilityArea};
pub use topic::{SEGMENT_SEPARATOR, SUBTOPIC_SEPARATOR, Weight, validate};

pub(crate) use tree::{RecordId, TopicTree};

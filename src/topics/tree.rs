//! # Subscription trie.
//!
//! [`TopicTree`] stores one node per topic segment. Nodes are keyed either by the
//! literal segment text or by the wildcard marker (an empty segment). Any node can
//! hold records *and* children at the same time.
//!
//! ## Lookup
//! ```text
//! find("a.b-x.c")
//!   root ─┬─ records collected (implicit trailing wildcard)
//!         ├─ "a" ─┬─ records collected
//!         │       ├─ "b-x" ─► ...
//!         │       ├─ "b"   ─► ...       (subtopic prefix)
//!         │       └─ (*)   ─► ...
//!         └─ (*) ─► ...
//! ```
//! - records of **every** visited node are collected;
//! - dash-truncated prefixes of a published segment are tried longest first;
//! - the wildcard child is always tried;
//! - results are sorted by [`Weight`] descending, ties in registration order.

use std::collections::HashMap;

use super::topic::{SEGMENT_SEPARATOR, Weight, subtopic_prefixes};

/// Identity of one inserted record; also its registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RecordId(u64);

struct Entry<R> {
    id: RecordId,
    weight: Weight,
    value: R,
}

struct Node<R> {
    records: Vec<Entry<R>>,
    literals: HashMap<Box<str>, Node<R>>,
    wildcard: Option<Box<Node<R>>>,
}

impl<R> Default for Node<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            literals: HashMap::new(),
            wildcard: None,
        }
    }
}

impl<R> Node<R> {
    fn is_empty(&self) -> bool {
        self.records.is_empty() && self.literals.is_empty() && self.wildcard.is_none()
    }

    fn child_mut(&mut self, segment: &str) -> &mut Node<R> {
        if segment.is_empty() {
            self.wildcard.get_or_insert_with(Box::default)
        } else {
            self.literals.entry(segment.into()).or_default()
        }
    }

    fn collect<'a>(&'a self, segments: &[&str], out: &mut Vec<&'a Entry<R>>) {
        out.extend(self.records.iter());

        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        for prefix in subtopic_prefixes(head) {
            if let Some(child) = self.literals.get(prefix) {
                child.collect(rest, out);
            }
        }
        if let Some(child) = &self.wildcard {
            child.collect(rest, out);
        }
    }

    /// Removes the record and prunes nodes left empty on the way back up.
    fn remove(&mut self, segments: &[&str], id: RecordId) -> Option<R> {
        let Some((head, rest)) = segments.split_first() else {
            let idx = self.records.iter().position(|e| e.id == id)?;
            return Some(self.records.remove(idx).value);
        };

        if head.is_empty() {
            let child = self.wildcard.as_mut()?;
            let removed = child.remove(rest, id);
            if child.is_empty() {
                self.wildcard = None;
            }
            removed
        } else {
            let child = self.literals.get_mut(*head)?;
            let removed = child.remove(rest, id);
            if child.is_empty() {
                self.literals.remove(*head);
            }
            removed
        }
    }
}

/// Topic-indexed registry of subscriber records.
pub(crate) struct TopicTree<R> {
    root: Node<R>,
    next_id: u64,
    len: usize,
}

impl<R> Default for TopicTree<R> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            next_id: 0,
            len: 0,
        }
    }
}

impl<R: Clone> TopicTree<R> {
    /// Registers `value` under `topic` and returns its revocation id.
    pub(crate) fn insert(&mut self, topic: &str, value: R) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;

        let node = topic
            .split(SEGMENT_SEPARATOR)
            .fold(&mut self.root, |node, segment| node.child_mut(segment));
        node.records.push(Entry {
            id,
            weight: Weight::of(topic),
            value,
        });
        self.len += 1;
        id
    }

    /// Removes a record previously inserted under `topic`.
    pub(crate) fn remove(&mut self, topic: &str, id: RecordId) -> Option<R> {
        let segments: Vec<&str> = topic.split(SEGMENT_SEPARATOR).collect();
        let removed = self.root.remove(&segments, id);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Returns every record matching a published topic, most specific first.
    pub(crate) fn find(&self, topic: &str) -> Vec<R> {
        let segments: Vec<&str> = topic.split(SEGMENT_SEPARATOR).collect();
        let mut hits = Vec::new();
        self.root.collect(&segments, &mut hits);
        hits.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.id.cmp(&b.id)));
        hits.into_iter().map(|e| e.value.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(topics: &[&'static str]) -> TopicTree<&'static str> {
        let mut t = TopicTree::default();
        for topic in topics {
            t.insert(topic, *topic);
        }
        t
    }

    #[test]
    fn test_prefix_and_trailing_wildcard() {
        let t = tree(&["a.b"]);
        assert_eq!(t.find("a.b"), vec!["a.b"]);
        assert_eq!(t.find("a.b.c"), vec!["a.b"]);
        assert!(t.find("a.c").is_empty());
        assert!(t.find("a").is_empty());
    }

    #[test]
    fn test_empty_segment_is_wildcard() {
        let t = tree(&[".b"]);
        assert_eq!(t.find("a.b"), vec![".b"]);
        assert_eq!(t.find("x.b"), vec![".b"]);
        assert!(t.find("x.c").is_empty());

        let t = tree(&["a..c"]);
        assert_eq!(t.find("a.zzz.c"), vec!["a..c"]);
        assert!(t.find("a.zzz.d").is_empty());
    }

    #[test]
    fn test_subtopic_prefix_matching() {
        let t = tree(&["a.b"]);
        assert_eq!(t.find("a.b-sub"), vec!["a.b"]);
        assert_eq!(t.find("a.b-sub-more"), vec!["a.b"]);
        assert!(t.find("a.bx").is_empty());
    }

    #[test]
    fn test_subtopic_subscription_is_narrower() {
        let t = tree(&["a.b-sub"]);
        assert_eq!(t.find("a.b-sub-more"), vec!["a.b-sub"]);
        assert!(t.find("a.b").is_empty());
        assert!(t.find("a.b-other").is_empty());
    }

    #[test]
    fn test_results_sorted_most_specific_first() {
        let t = tree(&["", "a", "a.b", "a.b-x"]);
        assert_eq!(t.find("a.b-x"), vec!["a.b-x", "a.b", "a", ""]);
    }

    #[test]
    fn test_equal_weight_keeps_registration_order() {
        let t = tree(&["a", ".b"]);
        assert_eq!(t.find("a.b"), vec!["a", ".b"]);

        let t = tree(&[".b", "a"]);
        assert_eq!(t.find("a.b"), vec![".b", "a"]);
    }

    #[test]
    fn test_remove_prunes_and_counts() {
        let mut t = TopicTree::default();
        let keep = t.insert("a", "keep");
        let gone = t.insert("a.b.c", "gone");
        assert_eq!(t.len(), 2);

        assert_eq!(t.remove("a.b.c", gone), Some("gone"));
        assert_eq!(t.remove("a.b.c", gone), None);
        assert_eq!(t.len(), 1);
        assert!(t.root.literals["a"].literals.is_empty());

        assert_eq!(t.remove("a", keep), Some("keep"));
        assert!(t.root.is_empty());
    }

    #[test]
    fn test_remove_wrong_topic_is_noop() {
        let mut t = TopicTree::default();
        let id = t.insert("a.b", 1);
        assert_eq!(t.remove("a.c", id), None);
        assert_eq!(t.find("a.b"), vec![1]);
    }
}

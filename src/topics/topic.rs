//! # Topic grammar and specificity weight.
//!
//! A topic is a list of segments separated by `.`; each segment may be split further
//! into `-` separated subtopics:
//! ```text
//! page.main-header.open
//! ──┬─ ──────┬──── ──┬─
//!   │        │       └── segment 3
//!   │        └────────── segment 2, subtopics ["main", "header"]
//!   └─────────────────── segment 1
//! ```
//!
//! ## Rules
//! - An empty segment is a wildcard at that position (`".b"`, `"a..c"`, `""`).
//! - A subscription matches every deeper topic (implicit trailing wildcard).
//! - A subscription segment `b` matches published `b`, `b-x`, `b-x-y` but never `bx`.
//! - [`Weight`] orders subscribers most-specific-first.

use crate::error::BusError;

/// Separator between topic segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// Separator between subtopics inside one segment.
pub const SUBTOPIC_SEPARATOR: char = '-';

/// Specificity of a subscribed topic.
///
/// Compared lexicographically: more non-empty segments wins, then more subtopics.
///
/// # Example
/// ```
/// use cyclebus::Weight;
///
/// assert!(Weight::of("a.b") > Weight::of("a"));
/// assert!(Weight::of("a.b-c") > Weight::of("a.b"));
/// assert_eq!(Weight::of(".b"), Weight::of("a"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Weight {
    /// Number of non-empty segments.
    pub segments: u32,
    /// Dash-delimited subtopics beyond the first, summed over all segments.
    pub subtopics: u32,
}

impl Weight {
    /// Computes the weight of a subscribed topic.
    pub fn of(topic: &str) -> Self {
        topic
            .split(SEGMENT_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .fold(Weight::default(), |acc, segment| Weight {
                segments: acc.segments + 1,
                subtopics: acc.subtopics + segment.matches(SUBTOPIC_SEPARATOR).count() as u32,
            })
    }
}

/// Rejects topics that can never be addressed.
///
/// Whitespace and control characters are not allowed anywhere in a topic.
/// The empty topic is valid.
pub fn validate(topic: &str) -> Result<(), BusError> {
    if let Some(ch) = topic.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(BusError::InvalidTopic {
            topic: topic.to_string(),
            reason: if ch.is_control() {
                "control character"
            } else {
                "whitespace"
            },
        });
    }
    Ok(())
}

/// Dash-truncated prefixes of one published segment, longest first.
///
/// `"b-sub-more"` yields `"b-sub-more"`, `"b-sub"`, `"b"`.
pub(crate) fn subtopic_prefixes(segment: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(segment), |s| {
        s.rfind(SUBTOPIC_SEPARATOR).map(|idx| &s[..idx])
    })
    .filter(|prefix| !prefix.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_counts_non_empty_segments() {
        assert_eq!(Weight::of(""), Weight::default());
        assert_eq!(Weight::of("a..c").segments, 2);
        assert_eq!(Weight::of(".b").segments, 1);
    }

    #[test]
    fn test_weight_counts_subtopics_beyond_first() {
        let w = Weight::of("a-x.b-y-z");
        assert_eq!(w.segments, 2);
        assert_eq!(w.subtopics, 3);
    }

    #[test]
    fn test_weight_orders_segments_before_subtopics() {
        assert!(Weight::of("a.b") > Weight::of("a-x-y-z"));
        assert!(Weight::of("a-x") > Weight::of("a"));
    }

    #[test]
    fn test_subtopic_prefixes_longest_first() {
        let prefixes: Vec<_> = subtopic_prefixes("b-sub-more").collect();
        assert_eq!(prefixes, vec!["b-sub-more", "b-sub", "b"]);
        let plain: Vec<_> = subtopic_prefixes("bx").collect();
        assert_eq!(plain, vec!["bx"]);
    }

    #[test]
    fn test_validate_rejects_whitespace() {
        assert!(validate("a.b").is_ok());
        assert!(validate("").is_ok());
        assert!(matches!(
            validate("a b"),
            Err(BusError::InvalidTopic { reason: "whitespace", .. })
        ));
        assert!(validate("a\u{0}").is_err());
    }
}

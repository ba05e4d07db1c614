//! # Request/will/did topic conventions.
//!
//! A request topic follows `<verb>Request[.<suffix>]`. Responders acknowledge with
//! `will<Verb>[.<suffix>]` and complete with `did<Verb>[.<suffix>]`:
//! ```text
//! doThingRequest              → willDoThing              / didDoThing
//! beginLifecycleRequest.page  → willBeginLifecycle.page  / didBeginLifecycle.page
//! ```
//!
//! The helpers below spell out the topics external collaborators rely on
//! (lifecycle, navigation and visibility coordination). They are plain strings
//! layered on the generic grammar, not separate mechanisms.

use std::fmt;

use crate::error::BusError;

const REQUEST_MARKER: &str = "Request";

/// A parsed `<verb>Request[.<suffix>]` topic.
///
/// # Example
/// ```
/// use cyclebus::RequestTopic;
///
/// let req = RequestTopic::parse("changeAreaVisibilityRequest.sidebar").unwrap();
/// assert_eq!(req.verb(), "ChangeAreaVisibility.sidebar");
/// assert_eq!(req.will_topic(), "willChangeAreaVisibility.sidebar");
/// assert_eq!(req.did_topic(), "didChangeAreaVisibility.sidebar");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTopic {
    topic: String,
    verb: String,
}

impl RequestTopic {
    /// Parses a request topic.
    ///
    /// # Errors
    /// [`BusError::MalformedRequestTopic`] when the first segment does not end in
    /// `Request`, has nothing before `Request`, or does not start with a letter.
    pub fn parse(topic: &str) -> Result<Self, BusError> {
        let malformed = || BusError::MalformedRequestTopic {
            topic: topic.to_string(),
        };

        let (head, suffix) = match topic.split_once('.') {
            Some((head, suffix)) => (head, Some(suffix)),
            None => (topic, None),
        };
        let stem = head
            .strip_suffix(REQUEST_MARKER)
            .filter(|stem| !stem.is_empty())
            .ok_or_else(malformed)?;

        let mut chars = stem.chars();
        let first = chars
            .next()
            .filter(char::is_ascii_alphabetic)
            .ok_or_else(malformed)?;

        let mut verb = String::with_capacity(topic.len());
        verb.push(first.to_ascii_uppercase());
        verb.push_str(chars.as_str());
        if let Some(suffix) = suffix {
            verb.push('.');
            verb.push_str(suffix);
        }

        Ok(Self {
            topic: topic.to_string(),
            verb,
        })
    }

    /// The original request topic.
    pub fn as_str(&self) -> &str {
        &self.topic
    }

    /// Capitalized verb plus any trailing sub-action.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Topic responders publish to acknowledge they will reply later.
    pub fn will_topic(&self) -> String {
        format!("will{}", self.verb)
    }

    /// Topic responders publish when they are done.
    pub fn did_topic(&self) -> String {
        format!("did{}", self.verb)
    }
}

impl fmt::Display for RequestTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic)
    }
}

/// Visibility coordination area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityArea {
    /// Layout area.
    Area,
    /// Single widget.
    Widget,
}

impl VisibilityArea {
    fn as_str(self) -> &'static str {
        match self {
            VisibilityArea::Area => "Area",
            VisibilityArea::Widget => "Widget",
        }
    }
}

/// `beginLifecycleRequest.<scope>`
pub fn begin_lifecycle_request(scope: &str) -> String {
    format!("beginLifecycleRequest.{scope}")
}

/// `endLifecycleRequest.<scope>`
pub fn end_lifecycle_request(scope: &str) -> String {
    format!("endLifecycleRequest.{scope}")
}

/// `willNavigate.<target>`
pub fn will_navigate(target: &str) -> String {
    format!("willNavigate.{target}")
}

/// `didNavigate.<target>`
pub fn did_navigate(target: &str) -> String {
    format!("didNavigate.{target}")
}

/// `change{Area,Widget}VisibilityRequest.<id>`
pub fn change_visibility_request(area: VisibilityArea, id: &str) -> String {
    format!("change{}VisibilityRequest.{id}", area.as_str())
}

/// `willChange{Area,Widget}Visibility.<id>.<bool>`
pub fn will_change_visibility(area: VisibilityArea, id: &str, visible: bool) -> String {
    format!("willChange{}Visibility.{id}.{visible}", area.as_str())
}

/// `didChange{Area,Widget}Visibility.<id>.<bool>`
pub fn did_change_visibility(area: VisibilityArea, id: &str, visible: bool) -> String {
    format!("didChange{}Visibility.{id}.{visible}", area.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_request() {
        let req = RequestTopic::parse("doThingRequest").unwrap();
        assert_eq!(req.verb(), "DoThing");
        assert_eq!(req.will_topic(), "willDoThing");
        assert_eq!(req.did_topic(), "didDoThing");
        assert_eq!(req.to_string(), "doThingRequest");
    }

    #[test]
    fn test_parse_keeps_suffix_and_upper_first() {
        let req = RequestTopic::parse("LoadRequest.a.b").unwrap();
        assert_eq!(req.will_topic(), "willLoad.a.b");

        let req = RequestTopic::parse(&begin_lifecycle_request("page")).unwrap();
        assert_eq!(req.did_topic(), "didBeginLifecycle.page");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["doThing", "Request", "Request.x", "1thingRequest", "doRequest-x", ""] {
            assert!(
                matches!(
                    RequestTopic::parse(bad),
                    Err(BusError::MalformedRequestTopic { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_visibility_topics_line_up_with_request_grammar() {
        let req =
            RequestTopic::parse(&change_visibility_request(VisibilityArea::Widget, "w1")).unwrap();
        assert_eq!(req.will_topic(), "willChangeWidgetVisibility.w1");
        assert_eq!(
            will_change_visibility(VisibilityArea::Widget, "w1", true),
            "willChangeWidgetVisibility.w1.true"
        );
        assert_eq!(
            did_change_visibility(VisibilityArea::Area, "main", false),
            "didChangeAreaVisibility.main.false"
        );
        assert_eq!(will_navigate("home"), "willNavigate.home");
        assert_eq!(did_navigate("home"), "didNavigate.home");
        assert_eq!(end_lifecycle_request("app"), "endLifecycleRequest.app");
    }
}

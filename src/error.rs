//! Error types used by the bus and by subscriber handlers.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`]: errors surfaced to callers of the [`Bus`](crate::Bus) API.
//! - [`HandlerError`]: faults raised by individual handler invocations.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! Faults that happen *during* delivery never reach the publisher as a `BusError`;
//! they are routed to the bus error handler together with an [`ErrorDetails`] record.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::events::Reply;
use crate::handlers::HandlerId;

/// # Errors produced by the bus API.
///
/// Registration and malformed-topic faults fail synchronously at the call site.
/// Reply timeouts and a closed bus surface through the returned futures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// Topic contains characters that are never valid (whitespace, control characters).
    #[error("invalid topic {topic:?}: {reason}")]
    InvalidTopic {
        /// The rejected topic.
        topic: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Topic passed to `request_and_gather` does not follow the `<verb>Request[.<suffix>]` grammar.
    #[error("malformed request topic {topic:?}: expected `<verb>Request[.<suffix>]`")]
    MalformedRequestTopic {
        /// The rejected topic.
        topic: String,
    },

    /// Payload could not be converted into a JSON value.
    #[error("payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),

    /// Some responders announced `will...` but never replied with `did...` in time.
    #[error("reply timeout on {topic:?} after {timeout:?}; outstanding: {outstanding:?}")]
    ReplyTimeout {
        /// Request topic.
        topic: String,
        /// The configured timeout that elapsed.
        timeout: Duration,
        /// Responders that announced but never replied.
        outstanding: Vec<String>,
        /// Replies collected before the timeout.
        replies: Vec<Reply>,
    },

    /// No host ports were configured and no Tokio runtime is available.
    #[error("no host configured and no tokio runtime available")]
    NoHost,

    /// The bus or its host dropped the completion before it was resolved.
    #[error("bus closed before completion")]
    Closed,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cyclebus::BusError;
    ///
    /// let err = BusError::MalformedRequestTopic { topic: "doThing".into() };
    /// assert_eq!(err.as_label(), "bus_malformed_request_topic");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::InvalidTopic { .. } => "bus_invalid_topic",
            BusError::MalformedRequestTopic { .. } => "bus_malformed_request_topic",
            BusError::Payload(_) => "bus_payload",
            BusError::ReplyTimeout { .. } => "bus_reply_timeout",
            BusError::NoHost => "bus_no_host",
            BusError::Closed => "bus_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::InvalidTopic { topic, reason } => format!("topic={topic:?} {reason}"),
            BusError::MalformedRequestTopic { topic } => format!("malformed request topic={topic:?}"),
            BusError::Payload(e) => format!("payload: {e}"),
            BusError::ReplyTimeout {
                topic,
                outstanding,
                replies,
                ..
            } => format!(
                "reply timeout topic={topic:?} outstanding={outstanding:?} replies={}",
                replies.len()
            ),
            BusError::NoHost => "no host".to_string(),
            BusError::Closed => "closed".to_string(),
        }
    }

    /// Partial replies carried by a [`BusError::ReplyTimeout`], empty otherwise.
    pub fn replies(&self) -> &[Reply] {
        match self {
            BusError::ReplyTimeout { replies, .. } => replies,
            _ => &[],
        }
    }
}

/// # Faults raised by a handler invocation.
///
/// A handler either returns one of these or panics; panics are caught and
/// converted into [`HandlerError::Panicked`].
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum HandlerError {
    /// Handler reported a failure.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked while processing the event.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        HandlerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Panicked { .. } => "handler_panicked",
        }
    }
}

/// Context passed to the error handler next to the message.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum ErrorDetails {
    /// A subscriber failed while an event was being delivered to it.
    HandlerFault {
        /// Event topic.
        topic: Arc<str>,
        /// Event sender.
        sender: Option<Arc<str>>,
        /// Cycle the event was delivered in.
        cycle_id: u64,
        /// Registered name of the failing subscriber.
        subscriber: Arc<str>,
        /// Identity of the failing handler.
        handler: HandlerId,
        /// The fault itself.
        error: HandlerError,
    },

    /// A clone-mode subscriber could not receive its private payload copy.
    PayloadCopy {
        /// Event topic.
        topic: Arc<str>,
        /// Registered name of the skipped subscriber.
        subscriber: Arc<str>,
        /// Encoder/decoder message.
        error: String,
    },

    /// Reply gathering timed out with responders still outstanding.
    ReplyTimeout {
        /// Request topic.
        topic: Arc<str>,
        /// Responders that announced but never replied.
        outstanding: Vec<String>,
        /// Number of replies collected before the timeout.
        replies: usize,
    },

    /// `request_and_gather` was called with a topic outside the request grammar.
    MalformedRequestTopic {
        /// The rejected topic.
        topic: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(BusError::NoHost.as_label(), "bus_no_host");
        assert_eq!(BusError::Closed.as_label(), "bus_closed");
        assert_eq!(HandlerError::fail("x").as_label(), "handler_failed");
        assert_eq!(
            HandlerError::Panicked { info: "x".into() }.as_label(),
            "handler_panicked"
        );
    }

    #[test]
    fn test_timeout_message_lists_outstanding() {
        let err = BusError::ReplyTimeout {
            topic: "doThingRequest".into(),
            timeout: Duration::from_secs(1),
            outstanding: vec!["worker".into()],
            replies: Vec::new(),
        };
        assert!(err.as_message().contains("worker"));
        assert!(err.replies().is_empty());
    }
}

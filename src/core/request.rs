//! # Request/will/did reply gathering.
//!
//! `request_and_gather("<verb>Request[.<suffix>]")` publishes the request and collects
//! replies from responders following the will/did convention:
//!
//! ```text
//! requester                      bus                         responders
//!     │ request_and_gather ─────► subscribe will<Verb>, did<Verb>
//!     │                           arm timer
//!     │                           publish <verb>Request ─────► A, B
//!     │                                  ◄── will<Verb> (A)    A: "I'll answer later"
//!     │                                  ◄── did<Verb>  (B)    B: answers right away
//!     │                           request settled: pending {A} → wait
//!     │                                  ◄── did<Verb>  (A)
//!     │ ◄──── Ok([B, A])          pending {} → unsubscribe, cancel timer
//! ```
//!
//! ## Rules
//! - Nothing resolves before the request's own delivery future has settled.
//! - Replies are kept in arrival order; a `did` without a prior `will` still counts.
//! - Responders without a sender share one anonymous identity.
//! - On timeout the error handler sees the outstanding responders once, then the
//!   future fails with [`BusError::ReplyTimeout`] carrying the partial replies.
//! - Each gather finishes exactly once; late events are ignored.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::bus::Inner;
use super::completion::{Completion, GatherFuture};
use crate::error::{BusError, ErrorDetails};
use crate::events::{EventItem, Meta, Payload, PublishOptions, Reply, RequestOptions, SubscribeOptions};
use crate::handlers::{HandlerFn, HandlerId};
use crate::topics::{self, RequestTopic};

/// Identity used for replies from responders that did not set a sender.
const ANONYMOUS_RESPONDER: &str = "anonymous";

type Outcome = Result<Vec<Reply>, BusError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Request not yet settled; replies are collected.
    Armed,
    /// Deadline passed before the request settled and before anyone announced;
    /// settling with announced responders fails the gather.
    Overdue,
    /// Request settled; waiting for outstanding responders.
    Settled,
    /// Result sent.
    Done,
}

struct Gather {
    topic: Arc<str>,
    timeout: Duration,
    phase: Phase,
    pending: Vec<Arc<str>>,
    replies: Vec<Reply>,
    collectors: Vec<HandlerId>,
    cancel: CancellationToken,
    tx: Option<oneshot::Sender<Outcome>>,
}

/// Everything needed to finish a gather once its lock is released.
struct Finished {
    topic: Arc<str>,
    timeout: Duration,
    outstanding: Vec<String>,
    replies: Vec<Reply>,
    collectors: Vec<HandlerId>,
    cancel: CancellationToken,
    tx: Option<oneshot::Sender<Outcome>>,
}

impl Gather {
    fn on_will(&mut self, responder: Arc<str>) {
        if self.phase == Phase::Done {
            return;
        }
        if !self.pending.contains(&responder) {
            self.pending.push(responder);
        }
    }

    /// Records a reply; returns `true` when the gather can finish.
    fn on_did(&mut self, responder: &str, reply: Reply) -> bool {
        if self.phase == Phase::Done {
            return false;
        }
        if let Some(idx) = self.pending.iter().position(|p| &**p == responder) {
            self.pending.remove(idx);
        }
        self.replies.push(reply);
        self.phase == Phase::Settled && self.pending.is_empty()
    }

    /// Called once the request's delivery future settles.
    fn on_request_settled(&mut self) -> Settle {
        match self.phase {
            Phase::Armed | Phase::Overdue if self.pending.is_empty() => Settle::Complete,
            Phase::Overdue => Settle::TimedOut,
            Phase::Armed => {
                self.phase = Phase::Settled;
                Settle::Wait
            }
            Phase::Settled | Phase::Done => Settle::Wait,
        }
    }

    /// Called when the timer fires; returns `true` when the gather must fail now.
    fn on_deadline(&mut self) -> bool {
        match self.phase {
            Phase::Armed if self.pending.is_empty() => {
                self.phase = Phase::Overdue;
                false
            }
            Phase::Armed | Phase::Settled => !self.pending.is_empty(),
            Phase::Overdue | Phase::Done => false,
        }
    }

    fn finish(&mut self) -> Option<Finished> {
        if self.phase == Phase::Done {
            return None;
        }
        self.phase = Phase::Done;
        Some(Finished {
            topic: Arc::clone(&self.topic),
            timeout: self.timeout,
            outstanding: self.pending.drain(..).map(|p| p.to_string()).collect(),
            replies: std::mem::take(&mut self.replies),
            collectors: std::mem::take(&mut self.collectors),
            cancel: self.cancel.clone(),
            tx: self.tx.take(),
        })
    }
}

impl Finished {
    /// Cancels the timer and removes both collectors.
    fn release(&self, bus: &Weak<Inner>) {
        self.cancel.cancel();
        if let Some(inner) = bus.upgrade() {
            for id in &self.collectors {
                inner.unsubscribe(*id);
            }
        }
    }

    fn send(mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

/// What to do once the request itself has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    Wait,
    Complete,
    TimedOut,
}

type SharedGather = Arc<Mutex<Gather>>;

fn responder_of(meta: &Meta) -> Arc<str> {
    meta.sender
        .clone()
        .unwrap_or_else(|| Arc::from(ANONYMOUS_RESPONDER))
}

/// Resolves the gather with every reply collected so far.
fn complete(bus: &Weak<Inner>, gather: &SharedGather) {
    let Some(mut done) = gather.lock().finish() else {
        return;
    };
    done.release(bus);
    let replies = std::mem::take(&mut done.replies);
    tracing::debug!(topic = %done.topic, replies = replies.len(), "replies gathered");
    done.send(Ok(replies));
}

/// Timer callback: fails the gather if responders are still outstanding.
fn expire(bus: &Weak<Inner>, gather: &SharedGather) {
    let expired = gather.lock().on_deadline();
    if expired {
        time_out(bus, gather);
    }
}

/// Reports the outstanding responders once, then rejects with the partial replies.
fn time_out(bus: &Weak<Inner>, gather: &SharedGather) {
    let Some(mut done) = gather.lock().finish() else {
        return;
    };

    if let Some(inner) = bus.upgrade() {
        inner.report(
            &format!("no reply from {:?} on {}", done.outstanding, done.topic),
            ErrorDetails::ReplyTimeout {
                topic: Arc::clone(&done.topic),
                outstanding: done.outstanding.clone(),
                replies: done.replies.len(),
            },
        );
    }
    done.release(bus);

    let err = BusError::ReplyTimeout {
        topic: done.topic.to_string(),
        timeout: done.timeout,
        outstanding: std::mem::take(&mut done.outstanding),
        replies: std::mem::take(&mut done.replies),
    };
    done.send(Err(err));
}

impl Inner {
    pub(crate) fn request_and_gather(
        self: &Arc<Self>,
        topic: &str,
        payload: impl Serialize,
        opts: RequestOptions,
    ) -> Result<GatherFuture, BusError> {
        topics::validate(topic)?;
        let request = match RequestTopic::parse(topic) {
            Ok(request) => request,
            Err(err) => {
                self.report(
                    "request topic does not follow the request grammar",
                    ErrorDetails::MalformedRequestTopic {
                        topic: topic.to_string(),
                    },
                );
                return Err(err);
            }
        };
        let payload = serde_json::to_value(payload)?;

        let timeout = self.cfg.reply_timeout(opts.pending_did_timeout);
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let gather: SharedGather = Arc::new(Mutex::new(Gather {
            topic: topic.into(),
            timeout,
            phase: Phase::Armed,
            pending: Vec::new(),
            replies: Vec::new(),
            collectors: Vec::new(),
            cancel: cancel.clone(),
            tx: Some(tx),
        }));
        let bus = Arc::downgrade(self);

        let will = {
            let gather = Arc::clone(&gather);
            HandlerFn::arc(
                format!("{}:will", request.as_str()),
                move |_payload: Payload, meta: &Meta| {
                    gather.lock().on_will(responder_of(meta));
                    Ok(())
                },
            )
        };
        let did = {
            let gather = Arc::clone(&gather);
            let bus = bus.clone();
            HandlerFn::arc(
                format!("{}:did", request.as_str()),
                move |payload: Payload, meta: &Meta| {
                    let reply = Reply {
                        payload: payload.into_shared(),
                        meta: meta.detached(),
                    };
                    let ready = gather.lock().on_did(&responder_of(meta), reply);
                    if ready {
                        complete(&bus, &gather);
                    }
                    Ok(())
                },
            )
        };

        let will_id = self.subscribe(&request.will_topic(), will, SubscribeOptions::default())?;
        let did_id = self.subscribe(&request.did_topic(), did, SubscribeOptions::default())?;
        gather.lock().collectors = vec![will_id, did_id];

        {
            let gather = Arc::clone(&gather);
            let bus = bus.clone();
            self.timer
                .start(timeout, cancel, Box::new(move || expire(&bus, &gather)));
        }

        let settled = Completion::Then(Box::new(move || {
            let settle = gather.lock().on_request_settled();
            match settle {
                Settle::Complete => complete(&bus, &gather),
                Settle::TimedOut => time_out(&bus, &gather),
                Settle::Wait => {}
            }
        }));

        let options = PublishOptions {
            sender: opts.sender,
            deliver_to_sender: true,
        };
        self.enqueue(EventItem::with_options(topic, payload, options), settled);
        Ok(GatherFuture { rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Bus, BusConfig};
    use crate::events::Unsubscriber;
    use crate::handlers::HandlerRef;
    use crate::host::ManualHost;
    use futures::FutureExt;
    use serde_json::json;

    fn meta(item: &EventItem) -> Meta {
        Meta::for_delivery(item, 1, Unsubscriber::new(Weak::new(), HandlerId(0))).detached()
    }

    fn gather() -> (Gather, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let g = Gather {
            topic: "doThingRequest".into(),
            timeout: Duration::from_secs(1),
            phase: Phase::Armed,
            pending: Vec::new(),
            replies: Vec::new(),
            collectors: Vec::new(),
            cancel: CancellationToken::new(),
            tx: Some(tx),
        };
        (g, rx)
    }

    fn reply(sender: &str) -> Reply {
        let item = EventItem::with_options(
            "didDoThing",
            serde_json::json!(sender),
            PublishOptions::default().with_sender(sender),
        );
        Reply {
            payload: Arc::clone(&item.payload),
            meta: meta(&item),
        }
    }

    #[test]
    fn test_settled_without_pending_finishes() {
        let (mut g, _rx) = gather();
        assert_eq!(g.on_request_settled(), Settle::Complete);
    }

    #[test]
    fn test_waits_for_announced_responders() {
        let (mut g, _rx) = gather();
        g.on_will("a".into());
        g.on_will("a".into());
        assert_eq!(g.pending.len(), 1);

        assert!(!g.on_did("b", reply("b")));
        assert_eq!(g.on_request_settled(), Settle::Wait);
        assert_eq!(g.phase, Phase::Settled);
        assert!(g.on_did("a", reply("a")));
        assert_eq!(g.replies.len(), 2);
    }

    #[test]
    fn test_deadline_before_settle_is_remembered() {
        let (mut g, _rx) = gather();
        assert!(!g.on_deadline());
        assert_eq!(g.phase, Phase::Overdue);

        g.on_will("late".into());
        assert!(!g.on_deadline());
        assert_eq!(g.on_request_settled(), Settle::TimedOut);
    }

    #[test]
    fn test_deadline_before_settle_without_responders_completes() {
        let (mut g, _rx) = gather();
        assert!(!g.on_deadline());
        assert!(!g.on_did("b", reply("b")));
        assert_eq!(g.on_request_settled(), Settle::Complete);
    }

    #[test]
    fn test_deadline_with_pending_fails() {
        let (mut g, _rx) = gather();
        g.on_will("a".into());
        assert!(g.on_deadline());

        let (mut g, _rx) = gather();
        g.on_will("a".into());
        assert_eq!(g.on_request_settled(), Settle::Wait);
        assert!(g.on_deadline());
    }

    #[test]
    fn test_finish_happens_once() {
        let (mut g, mut rx) = gather();
        g.on_will("a".into());
        let done = g.finish();
        assert!(done.is_some());
        assert!(g.finish().is_none());
        assert!(!g.on_did("a", reply("a")));
        assert!(g.replies.is_empty());

        if let Some(done) = done {
            assert_eq!(done.outstanding, ["a"]);
            done.send(Ok(Vec::new()));
        }
        assert!(matches!(rx.try_recv(), Ok(Ok(replies)) if replies.is_empty()));
    }

    #[test]
    fn test_anonymous_responders_share_identity() {
        let item = EventItem::new("willDoThing", serde_json::Value::Null);
        assert_eq!(&*responder_of(&meta(&item)), ANONYMOUS_RESPONDER);
    }

    fn setup(timeout: Duration) -> (Arc<ManualHost>, Bus, Arc<Mutex<Vec<ErrorDetails>>>) {
        let host = ManualHost::new();
        let cfg = BusConfig {
            pending_did_timeout: timeout,
        };
        let bus = Bus::new(host.clone(), host.clone(), cfg);
        let errors: Arc<Mutex<Vec<ErrorDetails>>> = Arc::default();
        let sink = Arc::clone(&errors);
        bus.set_error_handler(move |_: &str, details: &ErrorDetails| {
            sink.lock().push(details.clone());
        });
        (host, bus, errors)
    }

    /// Responder that may announce (`willDoThing`) and may reply (`didDoThing`) right away.
    fn responder(bus: &Bus, name: &'static str, announce: bool, answer: bool) -> HandlerRef {
        let bus = bus.clone();
        HandlerFn::arc(name, move |_: Payload, _: &Meta| {
            let opts = PublishOptions::default().with_sender(name);
            if announce {
                let _ = bus.publish_with("willDoThing", (), opts.clone());
            }
            if answer {
                let _ = bus.publish_with("didDoThing", name, opts);
            }
            Ok(())
        })
    }

    #[test]
    fn test_synchronous_reply_resolves_in_same_cycle() {
        let (host, bus, errors) = setup(Duration::from_secs(5));
        bus.subscribe(
            "doThingRequest",
            responder(&bus, "fast", false, true),
            SubscribeOptions::default(),
        )
        .unwrap();

        let fut = bus
            .request_and_gather(
                "doThingRequest",
                json!({"x": 1}),
                RequestOptions::default().with_sender("asker"),
            )
            .unwrap();
        host.run_until_idle();

        let replies = match fut.now_or_never() {
            Some(Ok(replies)) => replies,
            other => panic!("gather not resolved: {other:?}"),
        };
        assert_eq!(replies.len(), 1);
        assert_eq!(*replies[0].payload, json!("fast"));
        assert_eq!(replies[0].meta.sender.as_deref(), Some("fast"));
        assert_eq!(replies[0].meta.initiator.as_deref(), Some("asker"));
        assert_eq!(replies[0].meta.cycle_id, 1);

        assert!(errors.lock().is_empty());
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(bus.subscription_count(), 1);
    }

    #[test]
    fn test_no_responders_resolves_empty() {
        let (host, bus, _) = setup(Duration::from_secs(5));
        let fut = bus
            .request_and_gather("doThingRequest", (), RequestOptions::default())
            .unwrap();
        assert!(host.run_next());
        assert!(matches!(fut.now_or_never(), Some(Ok(replies)) if replies.is_empty()));
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn test_announced_responder_is_awaited() {
        let (host, bus, errors) = setup(Duration::from_secs(5));
        bus.subscribe(
            "doThingRequest",
            responder(&bus, "slow", true, false),
            SubscribeOptions::default(),
        )
        .unwrap();

        let mut fut = bus
            .request_and_gather("doThingRequest", (), RequestOptions::default())
            .unwrap();
        host.run_until_idle();
        assert!((&mut fut).now_or_never().is_none());
        assert_eq!(host.pending_timers(), 1);

        let _ = bus
            .publish_with(
                "didDoThing",
                "late",
                PublishOptions::default().with_sender("slow"),
            )
            .unwrap();
        host.run_until_idle();

        let replies = match fut.now_or_never() {
            Some(Ok(replies)) => replies,
            other => panic!("gather not resolved: {other:?}"),
        };
        assert_eq!(replies.len(), 1);
        assert_eq!(*replies[0].payload, json!("late"));
        assert!(errors.lock().is_empty());
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(bus.subscription_count(), 1);
    }

    #[test]
    fn test_timeout_reports_outstanding_once() {
        let (host, bus, errors) = setup(Duration::from_secs(5));
        for (name, announce, answer) in [("fast", false, true), ("worker", true, false)] {
            bus.subscribe(
                "doThingRequest",
                responder(&bus, name, announce, answer),
                SubscribeOptions::default(),
            )
            .unwrap();
        }

        let mut fut = bus
            .request_and_gather("doThingRequest", (), RequestOptions::default())
            .unwrap();
        host.run_until_idle();
        host.advance(Duration::from_secs(4));
        assert!((&mut fut).now_or_never().is_none());

        host.advance(Duration::from_secs(1));
        match fut.now_or_never() {
            Some(Err(BusError::ReplyTimeout {
                outstanding,
                replies,
                timeout,
                ..
            })) => {
                assert_eq!(outstanding, ["worker"]);
                assert_eq!(replies.len(), 1);
                assert_eq!(timeout, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ErrorDetails::ReplyTimeout { outstanding, replies: 1, .. } if outstanding == &["worker"]
        ));
        assert_eq!(bus.subscription_count(), 2);

        // a late reply after the timeout changes nothing
        drop(errors);
        let _ = bus
            .publish_with("didDoThing", (), PublishOptions::default().with_sender("worker"))
            .unwrap();
        host.run_until_idle();
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn test_timer_firing_before_announcement_still_times_out() {
        let ticks = ManualHost::new();
        let timers = ManualHost::new();
        let cfg = BusConfig {
            pending_did_timeout: Duration::from_millis(10),
        };
        let bus = Bus::new(ticks.clone(), timers.clone(), cfg);
        let errors: Arc<Mutex<Vec<ErrorDetails>>> = Arc::default();
        let sink = Arc::clone(&errors);
        bus.set_error_handler(move |_: &str, details: &ErrorDetails| {
            sink.lock().push(details.clone());
        });
        bus.subscribe(
            "doThingRequest",
            responder(&bus, "worker", true, false),
            SubscribeOptions::default(),
        )
        .unwrap();

        let fut = bus
            .request_and_gather("doThingRequest", (), RequestOptions::default())
            .unwrap();

        // request delivered, the announcement is queued for the next tick
        assert!(ticks.run_next());
        assert_eq!(timers.advance(Duration::from_millis(10)), 1);
        ticks.run_until_idle();

        match fut.now_or_never() {
            Some(Err(BusError::ReplyTimeout {
                outstanding,
                replies,
                ..
            })) => {
                assert_eq!(outstanding, ["worker"]);
                assert!(replies.is_empty());
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(matches!(
            &errors.lock()[..],
            [ErrorDetails::ReplyTimeout { outstanding, .. }] if outstanding == &["worker"]
        ));
        assert_eq!(bus.subscription_count(), 1);
        assert_eq!(timers.pending_timers(), 0);
    }

    #[test]
    fn test_per_call_timeout_overrides_config() {
        let (host, bus, _) = setup(Duration::from_secs(120));
        bus.subscribe(
            "doThingRequest",
            responder(&bus, "worker", true, false),
            SubscribeOptions::default(),
        )
        .unwrap();

        let fut = bus
            .request_and_gather(
                "doThingRequest",
                (),
                RequestOptions::default().with_timeout(Duration::from_secs(1)),
            )
            .unwrap();
        host.run_until_idle();
        host.advance(Duration::from_secs(1));
        assert!(matches!(
            fut.now_or_never(),
            Some(Err(BusError::ReplyTimeout { .. }))
        ));
    }

    #[test]
    fn test_malformed_request_topic_is_reported() {
        let (host, bus, errors) = setup(Duration::from_secs(5));
        let err = bus
            .request_and_gather("doThing", (), RequestOptions::default())
            .unwrap_err();
        assert!(matches!(err, BusError::MalformedRequestTopic { .. }));
        assert!(matches!(
            &errors.lock()[..],
            [ErrorDetails::MalformedRequestTopic { topic }] if topic == "doThing"
        ));
        assert_eq!(bus.subscription_count(), 0);
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(host.pending_ticks(), 0);
    }
}

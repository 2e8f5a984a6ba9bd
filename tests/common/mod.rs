//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tasklink::{Endpoint, FeedConnection, FeedEvent, Transport, TransportReply};
use tokio::time::Instant;
use url::Url;

/// One step of a scripted feed.
#[derive(Debug, Clone)]
pub enum Step {
    /// Stay silent for this long.
    Wait(Duration),
    Event(FeedEvent),
    /// Close the feed.
    End,
    /// Stay silent forever.
    Pending,
}

pub fn opened() -> Step {
    Step::Event(FeedEvent::Opened)
}

pub fn frame(raw: impl Into<String>) -> Step {
    Step::Event(FeedEvent::Frame(raw.into()))
}

pub fn chunk(text: &str) -> Step {
    frame(json!({"type": "chunk", "text": text}).to_string())
}

pub fn heartbeat() -> Step {
    frame(r#"{"type":"heartbeat"}"#)
}

pub fn done() -> Step {
    frame(r#"{"type":"done"}"#)
}

pub fn wait_secs(secs: u64) -> Step {
    Step::Wait(Duration::from_secs(secs))
}

/// What a single `open_feed` call does.
#[derive(Debug, Clone)]
pub enum FeedScript {
    Refuse(String),
    Steps(Vec<Step>),
}

pub fn refuse() -> FeedScript {
    FeedScript::Refuse("connection refused".to_string())
}

#[derive(Default)]
pub struct ScriptedTransport {
    feeds: Mutex<VecDeque<FeedScript>>,
    trigger_replies: Mutex<VecDeque<Result<TransportReply, String>>>,
    call_replies: Mutex<VecDeque<Result<TransportReply, String>>>,
    opened_urls: Mutex<Vec<Url>>,
    triggers: Mutex<Vec<Value>>,
    calls: Mutex<Vec<Value>>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Feeds are handed out in order, one per `open_feed` call.
    pub fn push_feed(&self, script: FeedScript) {
        self.feeds.lock().unwrap().push_back(script);
    }

    pub fn push_steps(&self, steps: Vec<Step>) {
        self.push_feed(FeedScript::Steps(steps));
    }

    /// Reply to the next streaming trigger call. Unscripted triggers get 202.
    pub fn push_trigger_reply(&self, reply: TransportReply) {
        self.trigger_replies.lock().unwrap().push_back(Ok(reply));
    }

    /// Reply to the next buffered call. Unscripted calls fail at the network level.
    pub fn push_call_reply(&self, reply: TransportReply) {
        self.call_replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_call_failure(&self, reason: &str) {
        self.call_replies
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
    }

    pub fn opens(&self) -> usize {
        self.opened_urls.lock().unwrap().len()
    }

    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened_urls.lock().unwrap().clone()
    }

    pub fn triggers(&self) -> Vec<Value> {
        self.triggers.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open_feed(&self, url: &Url) -> Result<Box<dyn FeedConnection>> {
        self.opened_urls.lock().unwrap().push(url.clone());
        let script = self
            .feeds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FeedScript::Refuse("no scripted feed".to_string()));

        match script {
            FeedScript::Refuse(reason) => Err(anyhow!(reason)),
            FeedScript::Steps(steps) => Ok(Box::new(ScriptedFeed {
                steps: steps.into(),
                wake_at: None,
                closes: Arc::clone(&self.closes),
            })),
        }
    }

    async fn send_request(&self, _url: &Url, payload: &Value) -> Result<TransportReply> {
        let streaming = payload.get("stream").and_then(Value::as_bool) == Some(true);
        let reply = if streaming {
            self.triggers.lock().unwrap().push(payload.clone());
            self.trigger_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TransportReply::new(202, "")))
        } else {
            self.calls.lock().unwrap().push(payload.clone());
            self.call_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted reply".to_string()))
        };
        reply.map_err(|reason| anyhow!(reason))
    }
}

/// Replays its steps. Wait deadlines live on the struct so a dropped
/// `next_event` future does not shorten the silence.
struct ScriptedFeed {
    steps: VecDeque<Step>,
    wake_at: Option<Instant>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FeedConnection for ScriptedFeed {
    async fn next_event(&mut self) -> Option<FeedEvent> {
        loop {
            if let Some(at) = self.wake_at {
                tokio::time::sleep_until(at).await;
                self.wake_at = None;
            }
            if matches!(self.steps.front(), None | Some(Step::Pending)) {
                return std::future::pending().await;
            }
            match self.steps.pop_front() {
                Some(Step::Wait(d)) => self.wake_at = Some(Instant::now() + d),
                Some(Step::Event(event)) => return Some(event),
                Some(Step::End) => return None,
                Some(Step::Pending) | None => unreachable!(),
            }
        }
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn endpoint() -> Endpoint {
    Endpoint::from_base("http://tasks.test", "/call", "/sse")
        .unwrap()
        .with_session_query_param("sessionId")
}

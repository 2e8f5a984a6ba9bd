//! One incremental-feed attempt, end to end.
//!
//! ```text
//! Opening ──open signal──▶ Active ──terminal / error / idle / interrupt──▶ Settling ──▶ Closed
//!                          ▲    │
//!                          └────┘ chunk, heartbeat, unrecognized
//! ```
//!
//! The session opens the feed, waits for the open signal, fires the trigger
//! call, then accumulates frames until one of them ends the stream. The
//! connection is released before the outcome is handed back, on every path.
//! Frame handling and idle checks run from one `select!` loop, so no two
//! handlers ever touch the session state at the same time.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::envelope::{ResponseEnvelope, parse_frame};
use crate::error::{DEFAULT_BODY_EXCERPT_LIMIT, InvokeError, truncate_body};
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use crate::request::InvocationRequest;
use crate::scope::CallScope;
use crate::transport::{Endpoint, FeedConnection, FeedEvent, Transport, TransportReply};

const MAX_IDLE_CHECK: Duration = Duration::from_secs(1);
const MIN_IDLE_CHECK: Duration = Duration::from_millis(200);

/// How often the idle timer is checked for a given liveness timeout.
pub fn idle_check_interval(timeout: Duration) -> Duration {
    (timeout / 10).min(MAX_IDLE_CHECK).max(MIN_IDLE_CHECK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Opening,
    Active,
    Settling,
    Closed,
}

impl SessionPhase {
    fn can_move_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Opening, Active) | (Opening, Settling) | (Active, Settling) | (Settling, Closed)
        )
    }
}

/// Mutable state owned by exactly one session.
#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    buffer: String,
    last_activity: Instant,
    frames: u64,
}

enum Step {
    Continue,
    Settle(Result<(), InvokeError>),
}

pub struct StreamingSession {
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    payload: Value,
    session_id: String,
    liveness_timeout: Duration,
    attempt: u32,
    body_excerpt_limit: usize,
    observer: Arc<dyn Observer>,
    state: SessionState,
    connection: Option<Box<dyn FeedConnection>>,
}

impl StreamingSession {
    /// Build a fresh attempt. `payload` is the trigger call body.
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: Endpoint,
        request: &InvocationRequest,
        payload: Value,
        attempt: u32,
    ) -> Self {
        Self {
            transport,
            endpoint,
            payload,
            session_id: request.session_id().to_string(),
            liveness_timeout: request.liveness_timeout(),
            attempt,
            body_excerpt_limit: DEFAULT_BODY_EXCERPT_LIMIT,
            observer: Arc::new(NoopObserver),
            state: SessionState {
                phase: SessionPhase::Opening,
                buffer: String::new(),
                last_activity: Instant::now(),
                frames: 0,
            },
            connection: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_body_excerpt_limit(mut self, limit: usize) -> Self {
        self.body_excerpt_limit = limit;
        self
    }

    /// Drive the session to completion and return the accumulated text.
    ///
    /// Partial content is discarded on every failure path.
    pub async fn run(mut self, scope: &CallScope) -> Result<String, InvokeError> {
        let outcome = self.drive(scope).await;
        if self.state.phase != SessionPhase::Settling {
            self.transition(SessionPhase::Settling);
        }
        self.release();
        self.transition(SessionPhase::Closed);

        let outcome = outcome.map(|()| std::mem::take(&mut self.state.buffer));
        self.observer.record_event(&ObserverEvent::SessionSettled {
            attempt: self.attempt,
            outcome: outcome.as_ref().map(String::len).map_err(InvokeError::kind),
        });
        self.observer
            .record_metric(&ObserverMetric::FramesReceived(self.state.frames));
        outcome
    }

    async fn drive(&mut self, scope: &CallScope) -> Result<(), InvokeError> {
        scope.check()?;
        self.open(scope).await?;
        self.await_open(scope).await?;

        self.transition(SessionPhase::Active);
        self.state.last_activity = Instant::now();
        self.observer.record_event(&ObserverEvent::StreamOpened {
            attempt: self.attempt,
        });

        let mut trigger = self.trigger();
        let mut trigger_pending = true;
        self.observer.record_event(&ObserverEvent::TriggerSent {
            attempt: self.attempt,
        });

        let mut ticker = tokio::time::interval(idle_check_interval(self.liveness_timeout));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                biased;
                err = scope.interrupted() => Step::Settle(Err(err)),
                reply = &mut trigger, if trigger_pending => {
                    trigger_pending = false;
                    self.on_trigger_reply(reply)
                }
                event = next_feed_event(&mut self.connection) => self.on_feed_event(event),
                _ = ticker.tick() => self.on_tick(Instant::now()),
            };

            if let Step::Settle(outcome) = step {
                self.transition(SessionPhase::Settling);
                return outcome;
            }
        }
    }

    async fn open(&mut self, scope: &CallScope) -> Result<(), InvokeError> {
        let url = self.endpoint.feed_url_for(&self.session_id);
        let timeout = self.liveness_timeout;
        let transport = Arc::clone(&self.transport);

        let conn = scope
            .guard(async move {
                match tokio::time::timeout(timeout, transport.open_feed(&url)).await {
                    Ok(Ok(conn)) => Ok(conn),
                    Ok(Err(e)) => Err(InvokeError::open_failed(format!("{e:#}"))),
                    Err(_) => Err(InvokeError::open_failed(format!(
                        "feed not established within {timeout:?}"
                    ))),
                }
            })
            .await?;
        self.connection = Some(conn);
        Ok(())
    }

    /// Wait for the open signal. Frames before it are dropped.
    async fn await_open(&mut self, scope: &CallScope) -> Result<(), InvokeError> {
        let open_by = Instant::now() + self.liveness_timeout;
        loop {
            let event = tokio::select! {
                biased;
                err = scope.interrupted() => return Err(err),
                _ = tokio::time::sleep_until(open_by) => {
                    return Err(InvokeError::open_failed(format!(
                        "no open signal within {:?}",
                        self.liveness_timeout
                    )));
                }
                event = next_feed_event(&mut self.connection) => event,
            };

            match event {
                Some(FeedEvent::Opened) => return Ok(()),
                Some(FeedEvent::Frame(_)) => {
                    self.observer.record_event(&ObserverEvent::FrameDropped {
                        attempt: self.attempt,
                    });
                }
                Some(FeedEvent::KeepAlive) => {}
                Some(FeedEvent::Error(reason)) => return Err(InvokeError::open_failed(reason)),
                None => return Err(InvokeError::open_failed("feed ended before opening")),
            }
        }
    }

    fn trigger(&self) -> BoxFuture<'static, anyhow::Result<TransportReply>> {
        let transport = Arc::clone(&self.transport);
        let url = self.endpoint.call_url.clone();
        let payload = self.payload.clone();
        Box::pin(async move { transport.send_request(&url, &payload).await })
    }

    fn on_trigger_reply(&mut self, reply: anyhow::Result<TransportReply>) -> Step {
        match reply {
            Ok(reply) if reply.is_success() => {
                trace!(attempt = self.attempt, status = reply.status, "trigger accepted");
                Step::Continue
            }
            Ok(reply) => Step::Settle(Err(InvokeError::TriggerCallFailed {
                status: Some(reply.status),
                reason: truncate_body(&reply.body, self.body_excerpt_limit),
                retry_after: reply.retry_after,
            })),
            Err(e) => Step::Settle(Err(InvokeError::TriggerCallFailed {
                status: None,
                reason: format!("{e:#}"),
                retry_after: None,
            })),
        }
    }

    fn on_feed_event(&mut self, event: Option<FeedEvent>) -> Step {
        match event {
            Some(FeedEvent::Frame(raw)) => self.on_frame(&raw),
            Some(FeedEvent::KeepAlive) => {
                self.state.last_activity = Instant::now();
                Step::Continue
            }
            Some(FeedEvent::Opened) => Step::Continue,
            Some(FeedEvent::Error(reason)) => {
                Step::Settle(Err(InvokeError::TransportError { reason }))
            }
            None => Step::Settle(Err(InvokeError::TransportError {
                reason: "feed closed before a terminal frame".to_string(),
            })),
        }
    }

    fn on_frame(&mut self, raw: &str) -> Step {
        self.state.last_activity = Instant::now();
        self.state.frames += 1;

        let envelope = parse_frame(raw);
        self.observer.record_event(&ObserverEvent::FrameReceived {
            attempt: self.attempt,
            envelope: envelope.label(),
        });

        if let Some(text) = envelope.content() {
            self.state.buffer.push_str(text);
        }

        match envelope {
            ResponseEnvelope::Terminal { .. } | ResponseEnvelope::CallResult { .. } => {
                Step::Settle(Ok(()))
            }
            _ => Step::Continue,
        }
    }

    fn on_tick(&mut self, now: Instant) -> Step {
        let idle = now.saturating_duration_since(self.state.last_activity);
        if idle < self.liveness_timeout {
            return Step::Continue;
        }
        self.observer.record_event(&ObserverEvent::IdleTimeout {
            attempt: self.attempt,
            idle,
        });
        Step::Settle(Err(InvokeError::IdleTimeout {
            idle,
            timeout: self.liveness_timeout,
        }))
    }

    fn transition(&mut self, next: SessionPhase) {
        let current = self.state.phase;
        debug_assert!(
            current.can_move_to(next),
            "invalid session transition {current:?} -> {next:?}"
        );
        debug!(attempt = self.attempt, from = ?current, to = ?next, "session transition");
        self.state.phase = next;
    }

    /// Close the connection if this session still holds it.
    fn release(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.release();
    }
}

async fn next_feed_event(conn: &mut Option<Box<dyn FeedConnection>>) -> Option<FeedEvent> {
    match conn {
        Some(conn) => conn.next_event().await,
        None => None,
    }
}

//! reqwest-backed transport: SSE for the incremental feed, JSON POST for calls.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use super::{FeedConnection, FeedEvent, Transport, TransportReply};
use crate::retry::parse_retry_after;
use crate::sse::{SseDecoder, SseItem};

/// Buffered feed events between the reader task and the session.
const FEED_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    /// Bound on a single request/response exchange. Feeds are not bounded
    /// by this; their liveness is tracked by the session.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            user_agent: format!("tasklink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct HttpTransport {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(options: HttpOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .user_agent(options.user_agent)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            request_timeout: options.request_timeout,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_feed(&self, url: &Url) -> Result<Box<dyn FeedConnection>> {
        let resp = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .context("feed request failed")?;

        if !resp.status().is_success() {
            bail!("feed request returned HTTP {}", resp.status());
        }

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump_feed(resp, tx, cancel.clone()));
        debug!(url = %url, "SSE feed connected");

        Ok(Box::new(HttpFeed {
            rx,
            cancel,
            task: Some(task),
        }))
    }

    async fn send_request(&self, url: &Url, payload: &Value) -> Result<TransportReply> {
        let resp = self
            .http
            .post(url.clone())
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = resp.status().as_u16();
        let retry_after = parse_retry_after(resp.headers());
        let body = resp.text().await.context("failed to read response body")?;
        trace!(status, body_len = body.len(), "call reply received");

        Ok(TransportReply {
            status,
            body,
            retry_after,
        })
    }
}

/// Reads the SSE body and forwards lifecycle events until the body ends,
/// the reader is cancelled, or the session drops its receiver.
async fn pump_feed(resp: reqwest::Response, tx: mpsc::Sender<FeedEvent>, cancel: CancellationToken) {
    if tx.send(FeedEvent::Opened).await.is_err() {
        return;
    }

    let mut stream = resp.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                for item in decoder.push(&bytes) {
                    if tx.send(feed_event(item)).await.is_err() {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                let _ = tx.send(FeedEvent::Error(format!("stream read error: {e}"))).await;
                return;
            }
            None => {
                if let Some(item) = decoder.finish() {
                    let _ = tx.send(feed_event(item)).await;
                }
                return;
            }
        }
    }
}

fn feed_event(item: SseItem) -> FeedEvent {
    match item {
        SseItem::Comment => FeedEvent::KeepAlive,
        SseItem::Event { event, data, .. } => match event.as_deref() {
            Some("error") => FeedEvent::Error(data),
            // MCP-style servers announce the message endpoint first; it carries no content.
            Some("endpoint") => FeedEvent::KeepAlive,
            _ => FeedEvent::Frame(data),
        },
    }
}

struct HttpFeed {
    rx: mpsc::Receiver<FeedEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl FeedConnection for HttpFeed {
    async fn next_event(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            self.cancel.cancel();
            self.rx.close();
            task.abort();
            debug!("SSE feed closed");
        }
    }
}

impl Drop for HttpFeed {
    fn drop(&mut self) {
        self.close();
    }
}

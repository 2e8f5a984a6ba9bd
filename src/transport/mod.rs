//! Network boundary.
//!
//! Sessions and invokers only talk to the remote endpoint through
//! [`Transport`], so tests substitute scripted implementations and the
//! binary plugs in [`HttpTransport`].

mod http;

pub use http::{HttpOptions, HttpTransport};

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Lifecycle signal from an incremental feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The connection is established; frames may follow.
    Opened,
    /// One raw data frame.
    Frame(String),
    /// Transport-level liveness without content (e.g. SSE comment lines).
    KeepAlive,
    /// The connection failed after being requested.
    Error(String),
}

/// An open incremental feed, exclusively owned by one streaming session.
#[async_trait]
pub trait FeedConnection: Send {
    /// Next event in arrival order; `None` once the feed has ended.
    async fn next_event(&mut self) -> Option<FeedEvent>;

    /// Release the connection. Safe to call more than once.
    fn close(&mut self);
}

/// Reply to a single request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, when the server sent one.
    pub retry_after: Option<Duration>,
}

impl TransportReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Request an incremental feed. Errors here mean the feed was never established.
    async fn open_feed(&self, url: &Url) -> Result<Box<dyn FeedConnection>>;

    /// One request/response exchange.
    async fn send_request(&self, url: &Url, payload: &Value) -> Result<TransportReply>;
}

/// Where calls and feeds go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub call_url: Url,
    pub feed_url: Url,
    /// Query parameter carrying the session id on the feed URL.
    pub session_query_param: Option<String>,
}

impl Endpoint {
    pub fn new(call_url: Url, feed_url: Url) -> Self {
        Self {
            call_url,
            feed_url,
            session_query_param: None,
        }
    }

    /// Resolve call and feed paths against one base URL.
    pub fn from_base(base_url: &str, call_path: &str, feed_path: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid base URL: {base_url}"))?;
        let call_url = join(&base, call_path);
        let feed_url = join(&base, feed_path);
        Ok(Self::new(call_url, feed_url))
    }

    pub fn with_session_query_param(mut self, param: impl Into<String>) -> Self {
        self.session_query_param = Some(param.into());
        self
    }

    /// Feed URL for one session, with the session id attached when configured.
    pub fn feed_url_for(&self, session_id: &str) -> Url {
        let mut url = self.feed_url.clone();
        if let Some(ref param) = self.session_query_param {
            url.query_pairs_mut().append_pair(param, session_id);
        }
        url
    }
}

fn join(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
}

//! Typed failures surfaced by the invocation client.
//!
//! Every transport-level failure is classified into one of these variants
//! before it leaves a session or invoker, so callers can tell a transient
//! network blip apart from a misconfigured endpoint or their own cancellation.

use std::time::Duration;

use thiserror::Error;

/// Default number of response-body bytes kept in error values.
pub const DEFAULT_BODY_EXCERPT_LIMIT: usize = 512;

/// Failure of one invocation, or of one streaming attempt within it.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("incremental feed could not be opened: {reason}")]
    ConnectionOpenFailed { reason: String },

    #[error("feed transport failed after opening: {reason}")]
    TransportError { reason: String },

    #[error("no activity for {idle:?} (liveness timeout {timeout:?})")]
    IdleTimeout { idle: Duration, timeout: Duration },

    #[error("streaming trigger call failed{}: {reason}", status_suffix(.status))]
    TriggerCallFailed {
        status: Option<u16>,
        reason: String,
        /// Server-provided `Retry-After`, used as the next backoff delay.
        retry_after: Option<Duration>,
    },

    #[error("invocation cancelled by caller")]
    CancellationRequested,

    #[error("invocation deadline of {deadline:?} exceeded")]
    DeadlineExceeded { deadline: Duration },

    #[error("single-shot call returned HTTP {status}: {body_excerpt}")]
    SingleShotHttpError { status: u16, body_excerpt: String },

    #[error("single-shot call returned an unusable body: {reason}")]
    SingleShotParseError { reason: String },

    #[error("all {attempts} streaming attempts failed: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<InvokeError>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Coarse classification of an [`InvokeError`], cheap to copy into logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionOpenFailed,
    TransportError,
    IdleTimeout,
    TriggerCallFailed,
    CancellationRequested,
    DeadlineExceeded,
    SingleShotHttpError,
    SingleShotParseError,
    RetriesExhausted,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionOpenFailed => "connection_open_failed",
            Self::TransportError => "transport_error",
            Self::IdleTimeout => "idle_timeout",
            Self::TriggerCallFailed => "trigger_call_failed",
            Self::CancellationRequested => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::SingleShotHttpError => "single_shot_http_error",
            Self::SingleShotParseError => "single_shot_parse_error",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InvokeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionOpenFailed { .. } => ErrorKind::ConnectionOpenFailed,
            Self::TransportError { .. } => ErrorKind::TransportError,
            Self::IdleTimeout { .. } => ErrorKind::IdleTimeout,
            Self::TriggerCallFailed { .. } => ErrorKind::TriggerCallFailed,
            Self::CancellationRequested => ErrorKind::CancellationRequested,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::SingleShotHttpError { .. } => ErrorKind::SingleShotHttpError,
            Self::SingleShotParseError { .. } => ErrorKind::SingleShotParseError,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }

    /// Whether a fresh streaming attempt may succeed where this one failed.
    ///
    /// Cancellation and deadline expiry are caller decisions and always
    /// short-circuit; the single-shot kinds never come out of a session.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionOpenFailed { .. }
                | Self::TransportError { .. }
                | Self::IdleTimeout { .. }
                | Self::TriggerCallFailed { .. }
        )
    }

    /// Whether the fallback orchestrator may re-issue the call as single-shot.
    pub fn allows_fallback(&self) -> bool {
        !matches!(
            self,
            Self::CancellationRequested | Self::DeadlineExceeded { .. }
        )
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TriggerCallFailed { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn transport(err: &anyhow::Error) -> Self {
        Self::TransportError {
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn open_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionOpenFailed {
            reason: reason.into(),
        }
    }
}

/// Cut `body` down to at most `limit` bytes on a char boundary.
pub fn truncate_body(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

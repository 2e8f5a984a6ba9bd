use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Default liveness window for streaming sessions.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Shortest liveness window a request accepts.
pub const MIN_LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// How the caller wants the result delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InvocationMode {
    /// One request/response exchange.
    Buffered,
    /// Incremental feed with retry and single-shot fallback.
    #[default]
    Incremental,
}

/// One caller-initiated call. Immutable once built.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    operation: String,
    arguments: Value,
    session_id: String,
    mode: InvocationMode,
    liveness_timeout: Duration,
    deadline: Option<Duration>,
}

impl InvocationRequest {
    pub fn new(operation: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            arguments: Value::Object(Default::default()),
            session_id: session_id.into(),
            mode: InvocationMode::default(),
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            deadline: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Idle window for streaming; raised to [`MIN_LIVENESS_TIMEOUT`] if shorter.
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout.max(MIN_LIVENESS_TIMEOUT);
        self
    }

    /// Hard bound on the whole invocation, including retries and fallback.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mode(&self) -> InvocationMode {
        self.mode
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

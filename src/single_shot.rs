use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::envelope::{ResponseEnvelope, parse_value};
use crate::error::{DEFAULT_BODY_EXCERPT_LIMIT, InvokeError, truncate_body};
use crate::observability::{NoopObserver, Observer, ObserverEvent};
use crate::request::InvocationRequest;
use crate::scope::CallScope;
use crate::transport::{Endpoint, Transport};
use crate::wire::WireFormat;

/// Issues exactly one buffered call and extracts its text.
///
/// Extraction is best-effort: a reply that parses but matches no known
/// field yields an empty string rather than an error.
pub struct SingleShotInvoker {
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    wire: WireFormat,
    body_excerpt_limit: usize,
    observer: Arc<dyn Observer>,
}

impl SingleShotInvoker {
    pub fn new(transport: Arc<dyn Transport>, endpoint: Endpoint, wire: WireFormat) -> Self {
        Self {
            transport,
            endpoint,
            wire,
            body_excerpt_limit: DEFAULT_BODY_EXCERPT_LIMIT,
            observer: Arc::new(NoopObserver),
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

    pub async fn invoke(
        &self,
        request: &InvocationRequest,
        scope: &CallScope,
    ) -> Result<String, InvokeError> {
        scope.check()?;
        let payload = self.wire.build_payload(request, false);

        let reply = scope
            .guard(async {
                self.transport
                    .send_request(&self.endpoint.call_url, &payload)
                    .await
                    .map_err(|e| InvokeError::transport(&e))
            })
            .await?;

        self.observer
            .record_event(&ObserverEvent::SingleShotCompleted {
                status: reply.status,
            });

        if !reply.is_success() {
            return Err(InvokeError::SingleShotHttpError {
                status: reply.status,
                body_excerpt: truncate_body(&reply.body, self.body_excerpt_limit),
            });
        }

        if reply.body.trim().is_empty() {
            return Err(InvokeError::SingleShotParseError {
                reason: "empty response body".to_string(),
            });
        }

        let value: Value =
            serde_json::from_str(&reply.body).map_err(|e| InvokeError::SingleShotParseError {
                reason: format!("invalid JSON: {e}"),
            })?;

        Ok(extract_text(&value))
    }
}

/// Text carried by a buffered reply, or an empty string if none is found.
pub fn extract_text(value: &Value) -> String {
    match parse_value(value) {
        ResponseEnvelope::CallResult { text }
        | ResponseEnvelope::Chunk { text }
        | ResponseEnvelope::Terminal { text } => text,
        other => {
            debug!(envelope = other.label(), "no text field in single-shot reply");
            String::new()
        }
    }
}

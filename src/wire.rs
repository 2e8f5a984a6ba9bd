//! Outbound call envelope.
//!
//! Field names belong to the remote endpoint, so every one of them is
//! configurable. With `jsonrpc` enabled the envelope becomes the `params` of
//! a JSON-RPC 2.0 request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::request::InvocationRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireFormat {
    pub operation_field: String,
    pub session_field: String,
    pub arguments_field: String,
    /// Boolean flag telling the endpoint to push results on the feed.
    /// `None` omits the flag from every payload.
    pub stream_field: Option<String>,
    pub jsonrpc: bool,
    pub jsonrpc_method: String,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self {
            operation_field: "tool".to_string(),
            session_field: "sessionId".to_string(),
            arguments_field: "arguments".to_string(),
            stream_field: Some("stream".to_string()),
            jsonrpc: false,
            jsonrpc_method: "tools/call".to_string(),
        }
    }
}

impl WireFormat {
    /// Build the payload for one call. `streaming` marks the feed trigger.
    pub fn build_payload(&self, request: &InvocationRequest, streaming: bool) -> Value {
        let mut envelope = Map::new();
        envelope.insert(
            self.operation_field.clone(),
            Value::String(request.operation().to_string()),
        );
        envelope.insert(
            self.session_field.clone(),
            Value::String(request.session_id().to_string()),
        );
        envelope.insert(self.arguments_field.clone(), request.arguments().clone());
        if let Some(ref flag) = self.stream_field {
            envelope.insert(flag.clone(), Value::Bool(streaming));
        }

        if !self.jsonrpc {
            return Value::Object(envelope);
        }

        json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": self.jsonrpc_method,
            "params": Value::Object(envelope),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InvocationRequest {
        InvocationRequest::new("deep_research", "sess-42").with_arguments(json!({"q": "rust"}))
    }

    #[test]
    fn flat_envelope_uses_configured_fields() {
        let payload = WireFormat::default().build_payload(&request(), true);
        assert_eq!(
            payload,
            json!({
                "tool": "deep_research",
                "sessionId": "sess-42",
                "arguments": {"q": "rust"},
                "stream": true,
            })
        );
    }

    #[test]
    fn renamed_fields_and_no_stream_flag() {
        let wire = WireFormat {
            operation_field: "name".into(),
            session_field: "session_id".into(),
            arguments_field: "args".into(),
            stream_field: None,
            ..Default::default()
        };
        let payload = wire.build_payload(&request(), false);
        assert_eq!(payload["name"], "deep_research");
        assert_eq!(payload["session_id"], "sess-42");
        assert_eq!(payload["args"]["q"], "rust");
        assert!(payload.get("stream").is_none());
    }

    #[test]
    fn jsonrpc_wraps_envelope_in_params() {
        let wire = WireFormat {
            jsonrpc: true,
            ..Default::default()
        };
        let payload = wire.build_payload(&request(), false);
        assert_eq!(payload["jsonrpc"], "2.0");
        assert_eq!(payload["method"], "tools/call");
        assert_eq!(payload["params"]["sessionId"], "sess-42");
        assert_eq!(payload["params"]["stream"], false);
        assert!(payload["id"].as_str().is_some_and(|id| !id.is_empty()));
    }
}

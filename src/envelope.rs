//! Classification of inbound frames.
//!
//! The remote endpoint replies with several equivalent envelope shapes, so a
//! frame is matched against an ordered rule list rather than a fixed schema:
//!
//! 1. heartbeat marker → [`ResponseEnvelope::Heartbeat`]
//! 2. partial-content field without a terminal marker → [`ResponseEnvelope::Chunk`]
//! 3. terminal marker → [`ResponseEnvelope::Terminal`]
//! 4. nested `result` wrapper → [`ResponseEnvelope::CallResult`]
//! 5. anything that is not JSON → [`ResponseEnvelope::Chunk`] with the raw text
//!
//! Parsing never fails; the worst case is [`ResponseEnvelope::Unrecognized`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields that carry partial content, in lookup order.
const CONTENT_FIELDS: &[&str] = &["text", "chunk", "data", "partial", "delta", "content"];

/// Fields whose string value names the frame type.
const TYPE_FIELDS: &[&str] = &["type", "event", "kind"];

const HEARTBEAT_TYPES: &[&str] = &["heartbeat", "ping", "keepalive", "keep-alive"];
const TERMINAL_TYPES: &[&str] = &["done", "final", "complete", "completed", "end"];
const TERMINAL_FLAGS: &[&str] = &["done", "final", "complete"];

/// Sentinel some endpoints send instead of a structured terminal frame.
const DONE_SENTINEL: &str = "[DONE]";

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseEnvelope {
    /// Partial content; accumulate, never terminal.
    Chunk { text: String },
    /// Liveness only.
    Heartbeat,
    /// Explicit end of stream, possibly with trailing content.
    Terminal { text: String },
    /// A complete wrapped result; always terminal.
    CallResult { text: String },
    /// Nothing matched; appended verbatim by streaming sessions.
    Unrecognized { raw: String },
}

impl ResponseEnvelope {
    /// Returns true if this envelope ends a streaming session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. } | Self::CallResult { .. })
    }

    /// Content to append to the accumulated buffer, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Chunk { text } | Self::Terminal { text } | Self::CallResult { text } => {
                Some(text.as_str())
            }
            Self::Unrecognized { raw } => Some(raw.as_str()),
            Self::Heartbeat => None,
        }
    }

    /// Short variant label for diagnostics; never includes content.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Heartbeat => "heartbeat",
            Self::Terminal { .. } => "terminal",
            Self::CallResult { .. } => "call_result",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Classify one raw frame as received from the wire.
pub fn parse_frame(raw: &str) -> ResponseEnvelope {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ResponseEnvelope::Heartbeat;
    }
    if trimmed == DONE_SENTINEL {
        return ResponseEnvelope::Terminal {
            text: String::new(),
        };
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => classify(&value, raw),
        Err(_) => ResponseEnvelope::Chunk {
            text: raw.to_string(),
        },
    }
}

/// Classify an already-decoded frame.
pub fn parse_value(value: &Value) -> ResponseEnvelope {
    classify(value, &value.to_string())
}

fn classify(value: &Value, raw: &str) -> ResponseEnvelope {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::String(s) => return ResponseEnvelope::Chunk { text: s.clone() },
        _ => {
            return ResponseEnvelope::Unrecognized {
                raw: raw.to_string(),
            };
        }
    };

    if is_heartbeat(value) {
        return ResponseEnvelope::Heartbeat;
    }

    let terminal = is_terminal(value);
    let content = first_string(value, CONTENT_FIELDS);

    if let Some(text) = content {
        if !terminal {
            return ResponseEnvelope::Chunk {
                text: text.to_string(),
            };
        }
    }

    if terminal {
        let text = match (content, obj.get("result")) {
            (Some(text), _) => text.to_string(),
            (None, Some(result)) => result_text(result),
            (None, None) => String::new(),
        };
        return ResponseEnvelope::Terminal { text };
    }

    if let Some(result) = obj.get("result") {
        return ResponseEnvelope::CallResult {
            text: result_text(result),
        };
    }

    ResponseEnvelope::Unrecognized {
        raw: raw.to_string(),
    }
}

fn type_name(value: &Value) -> Option<String> {
    TYPE_FIELDS
        .iter()
        .find_map(|f| value.get(*f).and_then(Value::as_str))
        .map(str::to_ascii_lowercase)
}

fn is_heartbeat(value: &Value) -> bool {
    if value.get("heartbeat").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    type_name(value).is_some_and(|t| HEARTBEAT_TYPES.contains(&t.as_str()))
}

fn is_terminal(value: &Value) -> bool {
    if TERMINAL_FLAGS
        .iter()
        .any(|f| value.get(*f).and_then(Value::as_bool) == Some(true))
    {
        return true;
    }
    type_name(value).is_some_and(|t| TERMINAL_TYPES.contains(&t.as_str()))
}

fn first_string<'a>(value: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|f| value.get(*f).and_then(Value::as_str))
}

/// Best-effort text extraction from a `result` payload.
///
/// Falls back to the serialized result rather than failing.
fn result_text(result: &Value) -> String {
    match result {
        Value::Null => return String::new(),
        Value::String(s) => return s.clone(),
        _ => {}
    }

    if let Some(text) = result.get("text").and_then(Value::as_str) {
        return text.to_string();
    }

    if let Some(body) = result.get("body") {
        if let Some(s) = body.as_str() {
            return s.to_string();
        }
        if let Some(s) = body.get("text").and_then(Value::as_str) {
            return s.to_string();
        }
    }

    match result.get("content") {
        Some(Value::String(s)) => return s.clone(),
        Some(Value::Array(items)) => {
            let texts: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect();
            if !texts.is_empty() {
                return texts.join("\n");
            }
        }
        _ => {}
    }

    result.to_string()
}

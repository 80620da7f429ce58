//! Reply normalization: pull a displayable `reply` out of whatever the webhook returned.

use serde::Serialize;
use serde_json::{Map, Value};

pub const UNRECOGNIZED_FORMAT_REPLY: &str = "Response received but the format was not recognized.";
pub const EMPTY_RESPONSE_REPLY: &str = "Empty response from webhook.";

const REPLY_FIELD: &str = "reply";

/// Fields tried, in order, when the webhook did not send a usable `reply`.
const REPLY_ALIASES: [&str; 3] = ["mensagem", "message", "response"];

/// Webhook reply in the shape the widget expects. Serializes as `reply`, optional `status`,
/// then every other webhook field in its original order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

/// Normalize a JSON webhook body.
///
/// Objects: keep a non-empty string `reply` unchanged; else copy `mensagem`, `message`, or
/// `response`; else the first non-blank string field in declaration order; else the fixed
/// fallback. `reply` is always a string, so an alias only counts when it holds a non-empty
/// string; a numeric `mensagem` is skipped in favour of the next alias. A bare JSON string is
/// handled like a text body. Any other JSON value gets the fallback.
pub fn normalize_payload(payload: Value) -> NormalizedReply {
    match payload {
        Value::Object(map) => normalize_object(map),
        Value::String(s) => normalize_text(&s),
        _ => NormalizedReply {
            reply: UNRECOGNIZED_FORMAT_REPLY.to_string(),
            status: None,
            passthrough: Map::new(),
        },
    }
}

/// Normalize a body that was not JSON: the trimmed text is the reply.
pub fn normalize_text(raw: &str) -> NormalizedReply {
    let text = raw.trim();
    NormalizedReply {
        reply: if text.is_empty() {
            EMPTY_RESPONSE_REPLY.to_string()
        } else {
            text.to_string()
        },
        status: Some("success".to_string()),
        passthrough: Map::new(),
    }
}

fn normalize_object(map: Map<String, Value>) -> NormalizedReply {
    let reply = map
        .get(REPLY_FIELD)
        .and_then(non_empty_str)
        .or_else(|| {
            REPLY_ALIASES
                .iter()
                .find_map(|field| map.get(*field).and_then(non_empty_str))
        })
        .or_else(|| map.values().find_map(non_blank_str))
        .unwrap_or(UNRECOGNIZED_FORMAT_REPLY)
        .to_string();

    // Rebuilt rather than removed in place so the remaining fields keep their order.
    let passthrough = map
        .into_iter()
        .filter(|(key, _)| key != REPLY_FIELD)
        .collect();

    NormalizedReply {
        reply,
        status: None,
        passthrough,
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn non_blank_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

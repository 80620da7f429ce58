//! Inbound chat request validation. Pure: no lookups, no I/O.

use super::mode::{OperatingMode, CLIENT_ID_HEADER};
use serde_json::{Map, Value};

const JSON_MEDIA_TYPE: &str = "application/json";

/// Raw parts of an inbound chat request, as received by the HTTP layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct InboundChat<'a> {
    /// Declared Content-Type header value, if any.
    pub content_type: Option<&'a str>,
    /// `X-Client-ID` header value, if any (legacy mode only).
    pub client_id: Option<&'a str>,
    pub body: &'a [u8],
}

/// A validated chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub chatbot_id: String,
    pub message: String,
    /// Opaque caller value forwarded to the webhook unchanged.
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Content-Type must be application/json")]
    BadContentType,
    #[error("invalid JSON in request body")]
    MalformedBody,
    #[error("{0} header is required")]
    MissingHeader(&'static str),
    #[error("{0} is required in the request body")]
    MissingField(&'static str),
}

/// Validate an inbound request for the given mode.
///
/// Strict: content type, then body, then `chatbot_id`, then `message`.
/// Legacy: `X-Client-ID` header, then body, then `message`; any `chatbot_id` in the body is ignored.
pub fn validate(mode: OperatingMode, inbound: &InboundChat<'_>) -> Result<ChatRequest, RequestError> {
    if mode.requires_json_content_type() && !is_json_content_type(inbound.content_type) {
        return Err(RequestError::BadContentType);
    }

    let header_id = if mode.identifier_from_header() {
        let id = inbound
            .client_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RequestError::MissingHeader(CLIENT_ID_HEADER))?;
        Some(id.to_string())
    } else {
        None
    };

    let body = parse_object(inbound.body)?;

    let chatbot_id = match header_id {
        Some(id) => id,
        None => body
            .get("chatbot_id")
            .and_then(identifier_value)
            .ok_or(RequestError::MissingField("chatbot_id"))?,
    };

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(RequestError::MissingField("message"))?
        .to_string();

    let timestamp = body.get("timestamp").filter(|v| !v.is_null()).cloned();

    Ok(ChatRequest {
        chatbot_id,
        message,
        timestamp,
    })
}

/// Compares the media type only; parameters such as `charset` are ignored.
fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
        .unwrap_or(false)
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, RequestError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(RequestError::MalformedBody),
    }
}

/// Ids are opaque: non-blank strings, or numbers rendered as strings.
fn identifier_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

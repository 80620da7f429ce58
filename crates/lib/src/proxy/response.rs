//! Maps proxy results to HTTP status + JSON body, per operating mode.

use super::error::ProxyError;
use super::mode::OperatingMode;
use super::normalize::NormalizedReply;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub const NOT_CONFIGURED_REPLY: &str = "Sorry, the webhook is not configured for this chatbot.";
pub const TIMEOUT_REPLY: &str =
    "Sorry, the service is taking too long to respond. Please try again.";
pub const UPSTREAM_ERROR_REPLY: &str =
    "Sorry, there was a problem with the chat service. Please try again later.";
pub const CONNECTION_REPLY: &str =
    "Sorry, I couldn't connect to the chat service. Please check your connection.";
pub const LEGACY_UNAVAILABLE_REPLY: &str =
    "Sorry, I couldn't connect to the chat service right now. Please try again later.";
pub const INTERNAL_REPLY: &str = "Sorry, an internal error occurred. Please try again later.";

const INTERNAL_ERROR: &str = "internal server error";

/// Final response for one inbound chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl ProxyResponse {
    fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// 200 with the normalized webhook reply.
    pub fn reply(reply: &NormalizedReply) -> Self {
        match serde_json::to_value(reply) {
            Ok(body) => Self::new(StatusCode::OK, body),
            Err(e) => {
                log::error!("serializing normalized reply: {}", e);
                Self::internal()
            }
        }
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": INTERNAL_ERROR, "reply": INTERNAL_REPLY }),
        )
    }

    /// Error response for `err` under `mode`.
    pub fn error(mode: OperatingMode, err: &ProxyError) -> Self {
        match err {
            ProxyError::Validation(e) => {
                Self::new(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
            }
            ProxyError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
            }
            ProxyError::Internal(_) => Self::internal(),
            _ if mode.degrades_upstream_errors() => Self::degraded(err),
            ProxyError::WebhookNotConfigured(id) => Self::new(
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string(), "chatbot_id": id }),
            ),
            ProxyError::UpstreamTimeout => Self::new(
                StatusCode::REQUEST_TIMEOUT,
                json!({ "error": err.to_string(), "reply": TIMEOUT_REPLY }),
            ),
            ProxyError::UpstreamStatus(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                json!({ "error": err.to_string(), "reply": UPSTREAM_ERROR_REPLY }),
            ),
            ProxyError::UpstreamConnection(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": err.to_string(), "reply": CONNECTION_REPLY }),
            ),
        }
    }

    /// Legacy mode: a chat reply the widget can display as-is.
    fn degraded(err: &ProxyError) -> Self {
        let reply = match err {
            ProxyError::WebhookNotConfigured(_) => NOT_CONFIGURED_REPLY,
            _ => LEGACY_UNAVAILABLE_REPLY,
        };
        Self::new(StatusCode::OK, json!({ "reply": reply }))
    }
}

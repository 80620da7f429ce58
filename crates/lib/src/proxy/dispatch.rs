//! Outbound webhook call and outcome classification.

use super::mode::ModePolicy;
use super::request::ChatRequest;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::redirect::Policy;
use serde::Serialize;
use serde_json::Value;

/// Result of one outbound webhook call. Exactly one classification per call.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// 2xx with a JSON body.
    Success(Value),
    /// Transport timeout (connect, send, or body read).
    Timeout,
    /// Non-2xx status.
    HttpError(u16),
    /// DNS, refused connection, reset, or an unusable URL.
    ConnectionError(String),
    /// 2xx whose body is not JSON; carries the raw text.
    InvalidJson(String),
}

/// JSON body sent to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chatbot_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<&'a Value>,
}

impl<'a> WebhookPayload<'a> {
    /// Strict mode forwards chatbot_id and timestamp; legacy sends the message only.
    pub fn for_request(request: &'a ChatRequest, policy: &ModePolicy) -> Self {
        if policy.mode.forwards_request_metadata() {
            Self {
                message: &request.message,
                chatbot_id: Some(&request.chatbot_id),
                timestamp: request.timestamp.as_ref(),
            }
        } else {
            Self {
                message: &request.message,
                chatbot_id: None,
                timestamp: None,
            }
        }
    }
}

/// Posts chat payloads to webhooks. Cheap to clone; the pooled client is shared.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    /// Pooled client that does not follow redirects, so a 3xx answer is an `HttpError`.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST `payload` to `url` within the policy's timeout. Never fails; every failure is an outcome.
    pub async fn dispatch(
        &self,
        url: &str,
        payload: &WebhookPayload<'_>,
        policy: &ModePolicy,
    ) -> WebhookOutcome {
        let mut request = self
            .client
            .post(url)
            .timeout(policy.timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(payload);
        if let Some(ref ua) = policy.user_agent {
            request = request.header(USER_AGENT, ua.as_str());
        }

        let res = match request.send().await {
            Ok(res) => res,
            Err(e) => return classify_transport_error(&e),
        };
        let status = res.status();
        if !status.is_success() {
            log::debug!("webhook {} answered {}", url, status);
            return WebhookOutcome::HttpError(status.as_u16());
        }
        let text = match res.text().await {
            Ok(t) => t,
            Err(e) => return classify_transport_error(&e),
        };
        classify_body(text)
    }
}

fn classify_transport_error(e: &reqwest::Error) -> WebhookOutcome {
    if e.is_timeout() {
        WebhookOutcome::Timeout
    } else {
        WebhookOutcome::ConnectionError(e.to_string())
    }
}

fn classify_body(text: String) -> WebhookOutcome {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => WebhookOutcome::Success(value),
        Err(_) => WebhookOutcome::InvalidJson(text),
    }
}

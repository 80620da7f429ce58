//! Chat proxy: validate, resolve the chatbot, call its webhook, normalize the reply.
//!
//! One pipeline serves both entry points; [`OperatingMode`] selects where the chatbot id comes
//! from, how strict content-type checking is, and whether upstream failures are surfaced as
//! error statuses or degraded to a chat reply.

mod dispatch;
mod error;
mod mode;
mod normalize;
mod request;
mod response;

pub use dispatch::{WebhookDispatcher, WebhookOutcome, WebhookPayload};
pub use error::ProxyError;
pub use mode::{
    ModePolicy, OperatingMode, CLIENT_ID_HEADER, DEFAULT_LEGACY_TIMEOUT_MS,
    DEFAULT_STRICT_TIMEOUT_MS, DEFAULT_STRICT_USER_AGENT,
};
pub use normalize::{
    normalize_payload, normalize_text, NormalizedReply, EMPTY_RESPONSE_REPLY,
    UNRECOGNIZED_FORMAT_REPLY,
};
pub use request::{validate, ChatRequest, InboundChat, RequestError};
pub use response::{
    ProxyResponse, CONNECTION_REPLY, INTERNAL_REPLY, LEGACY_UNAVAILABLE_REPLY,
    NOT_CONFIGURED_REPLY, TIMEOUT_REPLY, UPSTREAM_ERROR_REPLY,
};

use crate::chatbot::ChatbotResolver;
use crate::config::ProxyConfig;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// The chat proxy core. Stateless per request; shared read-only across tasks.
pub struct ChatProxy {
    resolver: Arc<dyn ChatbotResolver>,
    dispatcher: WebhookDispatcher,
    legacy: ModePolicy,
    strict: ModePolicy,
}

impl ChatProxy {
    pub fn new(
        resolver: Arc<dyn ChatbotResolver>,
        dispatcher: WebhookDispatcher,
        config: &ProxyConfig,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            legacy: ModePolicy::for_mode(OperatingMode::Legacy, config),
            strict: ModePolicy::for_mode(OperatingMode::Strict, config),
        }
    }

    pub fn policy(&self, mode: OperatingMode) -> &ModePolicy {
        match mode {
            OperatingMode::Legacy => &self.legacy,
            OperatingMode::Strict => &self.strict,
        }
    }

    /// Handle one inbound chat request end to end. Always yields exactly one response; a panic
    /// anywhere in the pipeline becomes a generic 500.
    pub async fn handle(&self, mode: OperatingMode, inbound: InboundChat<'_>) -> ProxyResponse {
        let result = match AssertUnwindSafe(self.run(mode, inbound)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ProxyError::Internal(panic_message(panic.as_ref()))),
        };
        match result {
            Ok(reply) => ProxyResponse::reply(&reply),
            Err(err) => {
                match &err {
                    ProxyError::Internal(detail) => {
                        log::error!("{} chat: {}", mode.name(), detail)
                    }
                    e if e.is_upstream() => log::warn!("{} chat: {}", mode.name(), e),
                    e => log::debug!("{} chat rejected: {}", mode.name(), e),
                }
                ProxyResponse::error(mode, &err)
            }
        }
    }

    async fn run(
        &self,
        mode: OperatingMode,
        inbound: InboundChat<'_>,
    ) -> Result<NormalizedReply, ProxyError> {
        let policy = self.policy(mode);
        let request = validate(mode, &inbound)?;

        let record = self
            .resolver
            .resolve(&request.chatbot_id)
            .await
            .map_err(|e| ProxyError::Internal(format!("chatbot lookup failed: {}", e)))?
            .ok_or_else(|| ProxyError::NotFound(request.chatbot_id.clone()))?;
        let target = record
            .webhook_target()
            .ok_or_else(|| ProxyError::WebhookNotConfigured(request.chatbot_id.clone()))?;

        let payload = WebhookPayload::for_request(&request, policy);
        log::debug!(
            "{} chat: forwarding message for {} to {}",
            mode.name(),
            request.chatbot_id,
            target.url
        );
        let outcome = self.dispatcher.dispatch(&target.url, &payload, policy).await;
        settle(mode, outcome)
    }
}

/// Turn a webhook outcome into a reply or a proxy error.
///
/// Only strict mode treats a non-JSON 2xx body as a text reply; legacy mode degrades it like a
/// connection failure.
pub fn settle(mode: OperatingMode, outcome: WebhookOutcome) -> Result<NormalizedReply, ProxyError> {
    match outcome {
        WebhookOutcome::Success(payload) => Ok(normalize_payload(payload)),
        WebhookOutcome::InvalidJson(raw) => match mode {
            OperatingMode::Strict => Ok(normalize_text(&raw)),
            OperatingMode::Legacy => Err(ProxyError::UpstreamConnection(
                "webhook response is not valid JSON".to_string(),
            )),
        },
        WebhookOutcome::Timeout => Err(ProxyError::UpstreamTimeout),
        WebhookOutcome::HttpError(status) => Err(ProxyError::UpstreamStatus(status)),
        WebhookOutcome::ConnectionError(detail) => Err(ProxyError::UpstreamConnection(detail)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

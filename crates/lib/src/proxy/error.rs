//! Chat proxy error taxonomy.

use super::request::RequestError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Caller's fault; reported before any lookup or outbound call.
    #[error(transparent)]
    Validation(#[from] RequestError),
    #[error("chatbot with ID {0} not found")]
    NotFound(String),
    #[error("webhook URL is not configured for this chatbot")]
    WebhookNotConfigured(String),
    #[error("timed out connecting to the webhook")]
    UpstreamTimeout,
    #[error("webhook HTTP error: {0}")]
    UpstreamStatus(u16),
    #[error("webhook connection error: {0}")]
    UpstreamConnection(String),
    /// Detail is for the log only; callers get a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamTimeout
                | ProxyError::UpstreamStatus(_)
                | ProxyError::UpstreamConnection(_)
        )
    }
}

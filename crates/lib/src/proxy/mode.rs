//! Operating modes of the chat proxy and the per-mode policy derived from config.

use crate::config::{ModeConfig, ProxyConfig};
use std::time::Duration;

/// Header the legacy endpoint reads the chatbot id from.
pub const CLIENT_ID_HEADER: &str = "X-Client-ID";

pub const DEFAULT_LEGACY_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_STRICT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STRICT_USER_AGENT: &str = "hookchat-proxy/1.0";

/// Which chat entry point a request came through.
///
/// Legacy: chatbot id from the `X-Client-ID` header, any content type, and upstream failures
/// degrade to a 200 chat reply so the widget never shows a raw error.
/// Strict: chatbot id in the JSON body, `application/json` required, and upstream failures
/// surface as machine-readable error statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Legacy,
    Strict,
}

impl OperatingMode {
    pub fn name(self) -> &'static str {
        match self {
            OperatingMode::Legacy => "legacy",
            OperatingMode::Strict => "strict",
        }
    }

    /// True when the chatbot id comes from the `X-Client-ID` header rather than the body.
    pub fn identifier_from_header(self) -> bool {
        self == OperatingMode::Legacy
    }

    pub fn requires_json_content_type(self) -> bool {
        self == OperatingMode::Strict
    }

    /// True when upstream failures are answered with a 200 apology reply.
    pub fn degrades_upstream_errors(self) -> bool {
        self == OperatingMode::Legacy
    }

    /// True when chatbot_id and timestamp are forwarded to the webhook alongside the message.
    pub fn forwards_request_metadata(self) -> bool {
        self == OperatingMode::Strict
    }
}

/// Outbound call settings for one mode, with config values resolved against mode defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModePolicy {
    pub mode: OperatingMode,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl ModePolicy {
    pub fn legacy(config: &ModeConfig) -> Self {
        Self::resolve(OperatingMode::Legacy, config, DEFAULT_LEGACY_TIMEOUT_MS, None)
    }

    pub fn strict(config: &ModeConfig) -> Self {
        Self::resolve(
            OperatingMode::Strict,
            config,
            DEFAULT_STRICT_TIMEOUT_MS,
            Some(DEFAULT_STRICT_USER_AGENT),
        )
    }

    pub fn for_mode(mode: OperatingMode, config: &ProxyConfig) -> Self {
        match mode {
            OperatingMode::Legacy => Self::legacy(&config.legacy),
            OperatingMode::Strict => Self::strict(&config.strict),
        }
    }

    fn resolve(
        mode: OperatingMode,
        config: &ModeConfig,
        default_timeout_ms: u64,
        default_user_agent: Option<&str>,
    ) -> Self {
        let timeout_ms = config.timeout_ms.unwrap_or(default_timeout_ms).max(1);
        let user_agent = config
            .user_agent
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| default_user_agent.map(str::to_string));
        Self {
            mode,
            timeout: Duration::from_millis(timeout_ms),
            user_agent,
        }
    }
}

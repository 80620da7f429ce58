//! Chatbot record, display settings, and field validation.

use super::store::StoreError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "My First Chatbot";
pub const DEFAULT_PRIMARY_COLOR: &str = "#007BFF";
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hello! How can I help?";

const MAX_NAME_CHARS: usize = 100;
const MAX_WELCOME_CHARS: usize = 255;

/// One chatbot: identifier, webhook, and widget display settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotRecord {
    pub id: String,
    pub name: String,
    /// Empty when the operator has not configured a webhook yet.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

fn default_primary_color() -> String {
    DEFAULT_PRIMARY_COLOR.to_string()
}

fn default_welcome_message() -> String {
    DEFAULT_WELCOME_MESSAGE.to_string()
}

/// Where the proxy forwards chat messages for a chatbot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
}

/// Settings the embeddable widget needs to render itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub id: String,
    pub name: String,
    pub primary_color: String,
    pub welcome_message: String,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ChatbotUpdate {
    pub name: Option<String>,
    pub webhook_url: Option<String>,
    pub primary_color: Option<String>,
    pub welcome_message: Option<String>,
}

impl ChatbotRecord {
    /// New record with a fresh UUID and default display settings. An empty name gets the default.
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: if name.is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                name.to_string()
            },
            webhook_url: String::new(),
            primary_color: default_primary_color(),
            welcome_message: default_welcome_message(),
        }
    }

    /// The webhook to dispatch to, or None when unset.
    pub fn webhook_target(&self) -> Option<WebhookTarget> {
        let url = self.webhook_url.trim();
        if url.is_empty() {
            None
        } else {
            Some(WebhookTarget {
                url: url.to_string(),
            })
        }
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            id: self.id.clone(),
            name: self.name.clone(),
            primary_color: self.primary_color.clone(),
            welcome_message: self.welcome_message.clone(),
        }
    }

    /// Apply a partial update. Every provided field is validated before any is written, so a
    /// rejected update leaves the record untouched.
    pub fn apply(&mut self, update: ChatbotUpdate) -> Result<(), StoreError> {
        let name = update.name.map(|n| n.trim().to_string());
        if let Some(ref n) = name {
            validate_name(n)?;
        }
        let webhook_url = update.webhook_url.map(|u| u.trim().to_string());
        if let Some(ref u) = webhook_url {
            validate_webhook_url(u)?;
        }
        let primary_color = update.primary_color.map(|c| c.trim().to_string());
        if let Some(ref c) = primary_color {
            validate_color(c)?;
        }
        if let Some(ref w) = update.welcome_message {
            validate_welcome_message(w)?;
        }

        if let Some(n) = name {
            self.name = n;
        }
        if let Some(u) = webhook_url {
            self.webhook_url = u;
        }
        if let Some(c) = primary_color {
            self.primary_color = c;
        }
        if let Some(w) = update.welcome_message {
            self.welcome_message = w;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::Invalid("name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(StoreError::Invalid(format!(
            "name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(())
}

/// Empty clears the webhook; anything else must be an absolute http(s) URL.
fn validate_webhook_url(url: &str) -> Result<(), StoreError> {
    if url.is_empty() {
        return Ok(());
    }
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| StoreError::Invalid(format!("invalid webhook URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(StoreError::Invalid(format!(
            "webhook URL must use http or https, got {}",
            other
        ))),
    }
}

/// `#RRGGBB` hex.
fn validate_color(color: &str) -> Result<(), StoreError> {
    let ok = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!(
            "primary color must be #RRGGBB, got {}",
            color
        )))
    }
}

fn validate_welcome_message(message: &str) -> Result<(), StoreError> {
    if message.chars().count() > MAX_WELCOME_CHARS {
        return Err(StoreError::Invalid(format!(
            "welcome message must be at most {} characters",
            MAX_WELCOME_CHARS
        )));
    }
    Ok(())
}

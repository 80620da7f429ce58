//! Chatbot configuration store.
//!
//! A chatbot is a named webhook plus display settings. The proxy only reads records through
//! [`ChatbotResolver`]; [`ChatbotStore`] is the JSON-file implementation used by the gateway
//! and managed from the CLI.

mod record;
mod store;

pub use record::{
    ChatbotRecord, ChatbotUpdate, DisplaySettings, WebhookTarget, DEFAULT_NAME,
    DEFAULT_PRIMARY_COLOR, DEFAULT_WELCOME_MESSAGE,
};
pub use store::{ChatbotResolver, ChatbotStore, StoreError};

//! Gateway: HTTP server hosting the chat proxy endpoints.
//!
//! Single port. `POST /api/chat` is the legacy widget endpoint, `POST /api/v1/chat` the strict
//! proxy endpoint; `GET /embed/:id` serves widget display settings and `GET /` is a health check.

mod server;

pub use server::{
    build_router, preview_settings, run_gateway, EmbedQuery, GatewayState, LEGACY_CHAT_PATH,
    STRICT_CHAT_PATH,
};

//! Gateway HTTP server: chat endpoints, widget settings, and health.

use crate::chatbot::{ChatbotResolver, ChatbotStore, DisplaySettings};
use crate::config::{self, Config};
use crate::proxy::{
    ChatProxy, InboundChat, OperatingMode, ProxyResponse, WebhookDispatcher, CLIENT_ID_HEADER,
};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub const LEGACY_CHAT_PATH: &str = "/api/chat";
pub const STRICT_CHAT_PATH: &str = "/api/v1/chat";

/// Shared state for the gateway (config, chatbot store, chat proxy).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub store: Arc<ChatbotStore>,
    pub proxy: Arc<ChatProxy>,
}

impl GatewayState {
    /// Build state with a fresh pooled webhook client shared by both chat modes.
    pub fn new(config: Config, store: Arc<ChatbotStore>) -> Result<Self> {
        let dispatcher = WebhookDispatcher::new().context("building webhook http client")?;
        let resolver: Arc<dyn ChatbotResolver> = store.clone();
        let proxy = ChatProxy::new(resolver, dispatcher, &config.proxy);
        Ok(Self {
            config: Arc::new(config),
            store,
            proxy: Arc::new(proxy),
        })
    }
}

/// Routes for the gateway. Chat and embed paths are served with and without a trailing slash.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(LEGACY_CHAT_PATH, post(legacy_chat))
        .route("/api/chat/", post(legacy_chat))
        .route(STRICT_CHAT_PATH, post(strict_chat))
        .route("/api/v1/chat/", post(strict_chat))
        .route("/embed/:chatbot_id", get(embed_settings))
        .route("/embed/:chatbot_id/", get(embed_settings))
        .with_state(state)
}

/// Load the chatbot store and serve until SIGINT or SIGTERM.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let store_path = config::resolve_store_path(&config, &config_path);
    let store = ChatbotStore::load(&store_path)
        .await
        .with_context(|| format!("loading chatbot store from {}", store_path.display()))?;
    log::info!(
        "loaded {} chatbot(s) from {}",
        store.len().await,
        store_path.display()
    );

    let bind_addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let state = GatewayState::new(config, Arc::new(store))?;
    log::info!(
        "chat proxy budgets: legacy {:?}, strict {:?}",
        state.proxy.policy(OperatingMode::Legacy).timeout,
        state.proxy.policy(OperatingMode::Strict).timeout
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn inbound<'a>(headers: &'a HeaderMap, body: &'a Bytes) -> InboundChat<'a> {
    InboundChat {
        content_type: header_str(headers, CONTENT_TYPE.as_str()),
        client_id: header_str(headers, CLIENT_ID_HEADER),
        body: body.as_ref(),
    }
}

/// POST /api/chat: widget endpoint; chatbot id in `X-Client-ID`, body `{message}`.
async fn legacy_chat(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> ProxyResponse {
    state
        .proxy
        .handle(OperatingMode::Legacy, inbound(&headers, &body))
        .await
}

/// POST /api/v1/chat: body `{chatbot_id, message, timestamp?}` as application/json.
async fn strict_chat(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> ProxyResponse {
    state
        .proxy
        .handle(OperatingMode::Strict, inbound(&headers, &body))
        .await
}

/// Preview overrides for the widget settings.
#[derive(Debug, Default, Deserialize)]
pub struct EmbedQuery {
    pub primary_color: Option<String>,
    pub welcome_message: Option<String>,
}

/// Stored display settings with non-empty preview overrides applied.
pub fn preview_settings(mut settings: DisplaySettings, query: EmbedQuery) -> DisplaySettings {
    if let Some(color) = query.primary_color.filter(|c| !c.trim().is_empty()) {
        settings.primary_color = color;
    }
    if let Some(welcome) = query.welcome_message.filter(|w| !w.trim().is_empty()) {
        settings.welcome_message = welcome;
    }
    settings
}

/// GET /embed/:chatbot_id returns the widget display settings.
async fn embed_settings(
    State(state): State<GatewayState>,
    Path(chatbot_id): Path<String>,
    Query(query): Query<EmbedQuery>,
) -> Response {
    match state.store.resolve(&chatbot_id).await {
        Ok(Some(record)) => {
            Json(preview_settings(record.display_settings(), query)).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("chatbot with ID {} not found", chatbot_id) })),
        )
            .into_response(),
        Err(e) => {
            log::error!("embed settings for {}: {}", chatbot_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            )
                .into_response()
        }
    }
}

/// GET / returns a simple health JSON for liveness checks.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    if let Err(e) = state.store.reload_if_changed().await {
        log::warn!("health: chatbot store reload failed: {}", e);
    }
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "chatbots": state.store.len().await,
    }))
}

//! Integration tests: drive the gateway router with in-process requests against an httpmock
//! webhook and assert status codes, bodies, and whether the webhook was called.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use httpmock::Method::POST;
use httpmock::MockServer;
use lib::chatbot::{ChatbotRecord, ChatbotStore};
use lib::config::{Config, ModeConfig, ProxyConfig};
use lib::gateway::{build_router, GatewayState};
use lib::proxy::{
    CONNECTION_REPLY, DEFAULT_STRICT_USER_AGENT, LEGACY_UNAVAILABLE_REPLY, NOT_CONFIGURED_REPLY,
    TIMEOUT_REPLY, UNRECOGNIZED_FORMAT_REPLY, UPSTREAM_ERROR_REPLY,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn bot(id: &str, webhook_url: &str) -> ChatbotRecord {
    let mut record = ChatbotRecord::new("Support");
    record.id = id.to_string();
    record.webhook_url = webhook_url.to_string();
    record
}

fn app(records: Vec<ChatbotRecord>) -> Router {
    app_with(records, ProxyConfig::default())
}

fn app_with(records: Vec<ChatbotRecord>, proxy: ProxyConfig) -> Router {
    let config = Config {
        proxy,
        ..Config::default()
    };
    let store = Arc::new(ChatbotStore::in_memory(records));
    build_router(GatewayState::new(config, store).expect("gateway state"))
}

fn short_timeouts() -> ProxyConfig {
    let mode = ModeConfig {
        timeout_ms: Some(200),
        user_agent: None,
    };
    ProxyConfig {
        legacy: mode.clone(),
        strict: mode,
    }
}

fn strict_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/chat/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn legacy_request(client_id: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/chat/");
    if let Some(id) = client_id {
        builder = builder.header("X-Client-ID", id);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let body = serde_json::from_slice(&bytes).expect("response body is JSON");
    (status, body)
}

fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}/hook", port)
}

#[tokio::test]
async fn strict_forwards_payload_and_returns_normalized_reply() {
    let server = MockServer::start_async().await;
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/hook")
            .header("content-type", "application/json")
            .header("user-agent", DEFAULT_STRICT_USER_AGENT)
            .json_body(json!({
                "message": "hello",
                "chatbot_id": "bot-1",
                "timestamp": "2024-05-01T10:00:00Z"
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"session": "s-1", "mensagem": "oi!", "message": "hi!"}));
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        strict_request(json!({
            "chatbot_id": "bot-1",
            "message": "hello",
            "timestamp": "2024-05-01T10:00:00Z"
        })),
    )
    .await;

    hook.assert_calls(1);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "oi!");
    assert_eq!(body["session"], "s-1");
    assert_eq!(body["message"], "hi!");
}

#[tokio::test]
async fn strict_missing_fields_never_dispatch() {
    let server = MockServer::start_async().await;
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200).json_body(json!({"reply": "should not happen"}));
    });
    let url = server.url("/hook");

    for payload in [
        json!({"message": "hello"}),
        json!({"chatbot_id": "bot-1"}),
        json!({"chatbot_id": "bot-1", "message": ""}),
        json!({"chatbot_id": "", "message": "hello"}),
    ] {
        let (status, body) = send(app(vec![bot("bot-1", &url)]), strict_request(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload: {}", payload);
        assert!(body["error"].is_string());
    }
    hook.assert_calls(0);
}

#[tokio::test]
async fn strict_rejects_non_json_content_type() {
    let server = MockServer::start_async().await;
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200).json_body(json!({"reply": "no"}));
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("content-type", "text/plain")
        .body(Body::from(r#"{"chatbot_id":"bot-1","message":"hello"}"#))
        .expect("request");

    let (status, body) = send(app(vec![bot("bot-1", &server.url("/hook"))]), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Content-Type must be application/json");
    hook.assert_calls(0);
}

#[tokio::test]
async fn strict_rejects_malformed_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("content-type", "application/json; charset=utf-8")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, body) = send(app(vec![]), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid JSON in request body");
}

#[tokio::test]
async fn strict_unknown_chatbot_is_404() {
    let (status, body) = send(
        app(vec![bot("bot-1", "http://127.0.0.1:9/never")]),
        strict_request(json!({"chatbot_id": "missing", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "chatbot with ID missing not found");
}

#[tokio::test]
async fn not_configured_differs_by_mode() {
    let (status, body) = send(
        app(vec![bot("bot-1", "")]),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["chatbot_id"], "bot-1");
    assert!(body["error"].is_string());

    let (status, body) = send(
        app(vec![bot("bot-1", "")]),
        legacy_request(Some("bot-1"), r#"{"message":"hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": NOT_CONFIGURED_REPLY}));
}

#[tokio::test]
async fn strict_timeout_is_408_with_reply() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/slow");
        then.status(200)
            .delay(Duration::from_secs(2))
            .json_body(json!({"reply": "late"}));
    });

    let (status, body) = send(
        app_with(vec![bot("bot-1", &server.url("/slow"))], short_timeouts()),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["reply"], TIMEOUT_REPLY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn legacy_timeout_is_200_with_apology() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/slow");
        then.status(200)
            .delay(Duration::from_secs(2))
            .json_body(json!({"reply": "late"}));
    });

    let (status, body) = send(
        app_with(vec![bot("bot-1", &server.url("/slow"))], short_timeouts()),
        legacy_request(Some("bot-1"), r#"{"message":"hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": LEGACY_UNAVAILABLE_REPLY}));
}

#[tokio::test]
async fn strict_upstream_error_status_is_502() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(500).body("boom");
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "webhook HTTP error: 500");
    assert_eq!(body["reply"], UPSTREAM_ERROR_REPLY);
}

#[tokio::test]
async fn strict_webhook_client_error_is_502() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(404).body("no such hook");
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "webhook HTTP error: 404");
}

#[tokio::test]
async fn webhook_redirect_is_not_followed() {
    let server = MockServer::start_async().await;
    let moved = server.mock(|when, then| {
        when.method(POST).path("/old");
        then.status(302).header("location", server.url("/new"));
    });
    let target = server.mock(|when, then| {
        when.path("/new");
        then.status(200).json_body(json!({"reply": "redirected"}));
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/old"))]),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    moved.assert_calls(1);
    target.assert_calls(0);
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "webhook HTTP error: 302");
}

#[tokio::test]
async fn legacy_upstream_error_status_degrades() {
    let server = MockServer::start_async().await;
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(500).body("boom");
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        legacy_request(Some("bot-1"), r#"{"message":"hello"}"#),
    )
    .await;
    hook.assert_calls(1);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": LEGACY_UNAVAILABLE_REPLY}));
}

#[tokio::test]
async fn connection_failure_differs_by_mode() {
    let url = unused_local_url();

    let (status, body) = send(
        app(vec![bot("bot-1", &url)]),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reply"], CONNECTION_REPLY);
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.starts_with("webhook connection error")));

    let (status, body) = send(
        app(vec![bot("bot-1", &url)]),
        legacy_request(Some("bot-1"), r#"{"message":"hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": LEGACY_UNAVAILABLE_REPLY}));
}

#[tokio::test]
async fn strict_non_json_reply_is_trimmed_text() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200)
            .header("content-type", "text/plain")
            .body("  Thanks, we got your message!\n");
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"reply": "Thanks, we got your message!", "status": "success"})
    );
}

#[tokio::test]
async fn legacy_non_json_reply_degrades() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200).body("plain text");
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        legacy_request(Some("bot-1"), r#"{"message":"hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": LEGACY_UNAVAILABLE_REPLY}));
}

#[tokio::test]
async fn legacy_sends_message_only_and_normalizes() {
    let server = MockServer::start_async().await;
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/hook")
            .json_body(json!({"message": "hello"}));
        then.status(200).json_body(json!({"count": 2, "text": "fallback text"}));
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        legacy_request(Some("bot-1"), r#"{"message":"hello","chatbot_id":"ignored"}"#),
    )
    .await;
    hook.assert_calls(1);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "fallback text");
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn legacy_validation_never_dispatches() {
    let server = MockServer::start_async().await;
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200).json_body(json!({"reply": "no"}));
    });
    let url = server.url("/hook");

    let (status, body) = send(app(vec![bot("bot-1", &url)]), legacy_request(None, r#"{"message":"hello"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "X-Client-ID header is required");

    let (status, _) = send(app(vec![bot("bot-1", &url)]), legacy_request(Some("bot-1"), r#"{}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(vec![bot("bot-1", &url)]), legacy_request(Some("bot-1"), "nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(vec![bot("bot-1", &url)]), legacy_request(Some("other"), r#"{"message":"hello"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    hook.assert_calls(0);
}

#[tokio::test]
async fn webhook_without_string_fields_gets_fallback_reply() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200).json_body(json!({"ok": true, "items": [1, 2]}));
    });

    let (status, body) = send(
        app(vec![bot("bot-1", &server.url("/hook"))]),
        strict_request(json!({"chatbot_id": "bot-1", "message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], UNRECOGNIZED_FORMAT_REPLY);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn embed_settings_apply_preview_overrides() {
    let mut record = bot("bot-1", "");
    record.welcome_message = "Welcome!".to_string();
    let request = Request::builder()
        .method("GET")
        .uri("/embed/bot-1?primary_color=%23FF0000")
        .body(Body::empty())
        .expect("request");

    let (status, body) = send(app(vec![record]), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "id": "bot-1",
            "name": "Support",
            "primaryColor": "#FF0000",
            "welcomeMessage": "Welcome!"
        })
    );
}

#[tokio::test]
async fn embed_settings_accept_trailing_slash() {
    let request = Request::builder()
        .method("GET")
        .uri("/embed/bot-1/")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app(vec![bot("bot-1", "")]), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "bot-1");
}

#[tokio::test]
async fn embed_settings_unknown_chatbot_is_404() {
    let request = Request::builder()
        .method("GET")
        .uri("/embed/nope")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(app(vec![]), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

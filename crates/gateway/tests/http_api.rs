//! HTTP-level tests against the full router.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use openmud_agent::ChatService;
use openmud_core::error::ProviderError;
use openmud_core::message::ToolCallRequest;
use openmud_core::provider::{Provider, ProviderStyle, TurnReply, TurnRequest};
use openmud_gateway::{AppState, build_router};
use openmud_providers::ProviderRouter;
use openmud_telemetry::ToolTelemetry;
use openmud_tools::{BuiltinSchemaSource, ToolDispatcher, ToolSchemaCache};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Asks for one schedule, then answers.
struct TwoStepProvider;

#[async_trait]
impl Provider for TwoStepProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_turn(&self, request: TurnRequest) -> Result<TurnReply, ProviderError> {
        let already_called = request.messages.iter().any(|m| !m.tool_calls.is_empty());
        if already_called || request.tools.is_empty() {
            return Ok(TurnReply {
                text: "Schedule built.".into(),
                ..Default::default()
            });
        }
        Ok(TurnReply {
            tool_calls: vec![ToolCallRequest::new("c1", "build_schedule", Map::new())],
            ..Default::default()
        })
    }
}

struct FailingProvider(ProviderError);

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn send_turn(&self, _request: TurnRequest) -> Result<TurnReply, ProviderError> {
        Err(self.0.clone())
    }
}

fn app_with(provider: Arc<dyn Provider>, api_key: Option<&str>) -> axum::Router {
    let router = ProviderRouter::new().with(ProviderStyle::Completion, provider);
    let dispatcher = Arc::new(ToolDispatcher::with_local_tools(Arc::new(ToolTelemetry::new())));
    let chat = ChatService::new(
        router,
        Arc::new(ToolSchemaCache::new(Arc::new(BuiltinSchemaSource))),
        dispatcher,
    );
    build_router(Arc::new(AppState::new(Arc::new(chat), api_key.map(String::from))))
}

fn app(api_key: Option<&str>) -> axum::Router {
    app_with(Arc::new(TwoStepProvider), api_key)
}

fn post_chat(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_lists_endpoints() {
    let response = app(None)
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-api-version"], "1.0");
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "openmud");
    assert_eq!(body["endpoints"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn chat_round_trip_reports_tools_used() {
    let response = app(None)
        .oneshot(post_chat(json!({
            "messages": [{"role": "user", "content": "how long will this take?"}],
            "model": "gpt-4o-mini"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Schedule built.");
    assert_eq!(body["tools_used"], json!(["build_schedule"]));
}

#[tokio::test]
async fn chat_validation_errors_are_400() {
    let response = app(None).oneshot(post_chat(json!({"messages": []}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "messages array required");
    assert!(body["response"].is_null());

    let response = app(None)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_errors_are_500_with_user_message() {
    let app = app_with(Arc::new(FailingProvider(ProviderError::RateLimited { retry_after_secs: 5 })), None);
    let response = app
        .oneshot(post_chat(json!({"messages": [{"role": "user", "content": "hi"}]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Rate limit exceeded. Try again in a moment.");
    assert_eq!(body["response"], body["error"]);
}

#[tokio::test]
async fn metrics_open_without_configured_key() {
    let response = app(None)
        .oneshot(Request::builder().uri("/api/tool-metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totals"]["tool_invocations"], 0);
}

#[tokio::test]
async fn metrics_key_missing_wrong_and_right() {
    let app = app(Some("secret"));

    let missing = app
        .clone()
        .oneshot(Request::builder().uri("/api/tool-metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/tool-metrics")
                .header("x-api-key", "nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let right = app
        .oneshot(
            Request::builder()
                .uri("/api/tool-metrics")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_is_not_behind_the_metrics_key() {
    let response = app(Some("secret"))
        .oneshot(post_chat(json!({"messages": [{"role": "user", "content": "hello"}]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

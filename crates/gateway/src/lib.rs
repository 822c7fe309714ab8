//! HTTP surface for openmud.
//!
//! - `POST /api/chat`: one chat turn through [`ChatService`]
//! - `GET /api/tool-metrics`: telemetry snapshot, behind the optional API key
//! - `GET /api/health`: liveness and endpoint list
//!
//! Built on Axum. The handlers are thin: everything interesting happens in
//! `openmud-agent`.

pub mod api;
pub mod auth;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{
    Router, middleware,
    middleware::Next,
    routing::{get, post},
};
use openmud_agent::ChatService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Value of the `X-API-Version` header.
pub const API_VERSION: &str = "1.0";

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub chat: Arc<ChatService>,
    /// When set, `/api/tool-metrics` requires this key
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>, api_key: Option<String>) -> Self {
        Self { chat, api_key }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the router with all routes and layers.
pub fn build_router(state: SharedState) -> Router {
    let metrics = Router::new()
        .route("/api/tool-metrics", get(api::tool_metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ]);

    Router::new()
        .route("/api/chat", post(api::chat))
        .route("/api/health", get(api::health))
        .merge(metrics)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(middleware::from_fn(api_headers))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn api_headers(req: axum::extract::Request, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("x-api-version", HeaderValue::from_static(API_VERSION));
    response
}

/// Start the HTTP server.
pub async fn start(config: openmud_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let chat = Arc::new(ChatService::from_config(&config));
    if chat.router().list().is_empty() {
        warn!("No provider API key configured; chat requests will fail until one is set");
    }
    if config.gateway.api_key.is_none() {
        info!("No gateway API key set; tool metrics are open");
    }

    let app = build_router(Arc::new(AppState::new(chat, config.gateway.api_key.clone())));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

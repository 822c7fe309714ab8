//! Route handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use openmud_agent::{ChatError, ChatRequest};
use openmud_telemetry::TelemetrySnapshot;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::SharedState;

pub async fn chat(State(state): State<SharedState>, payload: Result<Json<ChatRequest>, JsonRejection>) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            return (
                status,
                Json(json!({"error": rejection.body_text(), "response": null})),
            )
                .into_response();
        }
    };

    match state.chat.chat(request).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &ChatError) -> Response {
    let message = e.user_message();
    if e.is_invalid_request() {
        (StatusCode::BAD_REQUEST, Json(json!({"error": message, "response": null}))).into_response()
    } else {
        error!(error = %e, "Chat failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": message, "response": message})),
        )
            .into_response()
    }
}

pub async fn tool_metrics(State(state): State<SharedState>) -> Json<TelemetrySnapshot> {
    Json(state.chat.telemetry().snapshot())
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    endpoints: [&'static str; 3],
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "openmud",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ["POST /api/chat", "GET  /api/tool-metrics", "GET  /api/health"],
    })
}

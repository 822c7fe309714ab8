//! Optional API-key guard.
//!
//! With no key configured every request passes. Otherwise the key must arrive
//! as `x-api-key: <key>` or `Authorization: Bearer <key>`.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use crate::SharedState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The key the client sent, if any.
pub fn provided_key(headers: &HeaderMap) -> Option<&str> {
    let from_header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty());

    from_header.or_else(|| {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    })
}

pub async fn require_api_key(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(req).await;
    };

    let rejection = match provided_key(req.headers()) {
        Some(key) if key == expected => None,
        Some(_) => Some((StatusCode::FORBIDDEN, "Invalid API key.")),
        None => Some((
            StatusCode::UNAUTHORIZED,
            "Missing API key. Pass x-api-key header or Authorization: Bearer <key>.",
        )),
    };

    match rejection {
        None => next.run(req).await,
        Some((status, message)) => {
            warn!(path = %req.uri().path(), status = status.as_u16(), "Rejected metrics request");
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn key_from_either_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(provided_key(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(provided_key(&headers), Some("abc"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(provided_key(&headers), Some("xyz"));
    }

    #[test]
    fn other_auth_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(provided_key(&headers), None);
    }
}

//! HTTP plumbing shared by both adapters.
//!
//! Adapters never touch `reqwest` directly; they hand a JSON body to a
//! [`Transport`] and get back the raw status and body. Tests swap in a
//! scripted transport to replay vendor responses.

use async_trait::async_trait;
use openmud_core::error::ProviderError;
use std::time::Duration;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body. Only transport-level failures are errors; any HTTP
    /// status comes back as an [`HttpResponse`].
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, ProviderError>;
}

/// The production transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, ProviderError> {
        let mut req = self.client.post(url).json(body);
        for (name, value) in headers {
            req = req.header(*name, value);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Map a non-success vendor response onto the error taxonomy.
pub fn classify_error(provider: &str, response: &HttpResponse) -> ProviderError {
    match response.status {
        401 | 403 => ProviderError::AuthenticationFailed(format!("Invalid {provider} API key")),
        429 => ProviderError::RateLimited { retry_after_secs: 5 },
        404 => ProviderError::ModelNotFound(vendor_message(&response.body)),
        _ if mentions_missing_model(&response.body) => {
            ProviderError::ModelNotFound(vendor_message(&response.body))
        }
        status => ProviderError::ApiError {
            status_code: status,
            message: vendor_message(&response.body),
        },
    }
}

fn mentions_missing_model(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("model") && (lower.contains("not found") || lower.contains("does not exist"))
}

/// Pull `error.message` out of a vendor error body, falling back to the raw text.
fn vendor_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(500).collect())
}

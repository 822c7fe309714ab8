//! Remote compute tools.
//!
//! Cost estimation math lives on a separate service. Each remote tool is a
//! thin [`ToolHandler`] that forwards `{tool_name, arguments}` to a
//! [`ComputeClient`] and unwraps `{result}` or `{error}`.

use async_trait::async_trait;
use openmud_core::error::ToolError;
use openmud_core::tool::ToolHandler;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ComputeClient: Send + Sync {
    async fn run(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError>;
}

/// Talks to the compute service over HTTP.
pub struct HttpComputeClient {
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpComputeClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            api_key,
            timeout,
            client,
        }
    }
}

#[async_trait]
impl ComputeClient for HttpComputeClient {
    async fn run(&self, tool_name: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason,
        };

        let mut req = self
            .client
            .post(&self.url)
            .json(&json!({"tool_name": tool_name, "arguments": arguments}));
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        debug!(tool = tool_name, url = %self.url, "Calling compute service");
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: tool_name.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                failed(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable compute response (status {status}): {e}")))?;

        unwrap_compute_response(tool_name, status, body)
    }
}

/// Turn a compute-service reply into the tool's value or error.
pub fn unwrap_compute_response(tool_name: &str, status: u16, body: Value) -> Result<Value, ToolError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let reason = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason,
        });
    }
    if !(200..300).contains(&status) {
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: format!("compute service returned {status}"),
        });
    }
    match body {
        Value::Object(mut map) => Ok(map.remove("result").unwrap_or(Value::Object(map))),
        other => Ok(other),
    }
}

/// A tool executed by the compute service.
pub struct RemoteTool {
    name: String,
    client: Arc<dyn ComputeClient>,
}

impl RemoteTool {
    pub fn new(name: impl Into<String>, client: Arc<dyn ComputeClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl ToolHandler for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        self.client.run(&self.name, arguments).await
    }
}

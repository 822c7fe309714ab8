//! Completion-style provider: OpenAI chat completions and compatible servers.
//!
//! - Bearer authentication
//! - System prompt as the first message
//! - `tools` + `tool_choice: "auto"` only when tools are declared
//! - Tool arguments travel as JSON strings and are parsed into objects here
//! - Each tool result goes back as its own `tool` message

use async_trait::async_trait;
use openmud_core::error::ProviderError;
use openmud_core::message::{Message, Role, ToolCallRequest};
use openmud_core::provider::{Provider, ProviderStyle, TurnReply, TurnRequest, Usage};
use openmud_core::tool::ToolSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fallback::{ModelAliases, try_candidates};
use crate::transport::{ReqwestTransport, Transport, classify_error};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    transport: Arc<dyn Transport>,
    aliases: ModelAliases,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            transport: Arc::new(ReqwestTransport::default()),
            aliases: ModelAliases::default(),
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", DEFAULT_BASE_URL, api_key)
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_aliases(mut self, aliases: ModelAliases) -> Self {
        self.aliases = aliases;
        self
    }

    fn to_api_messages(system: Option<&str>, messages: &[Message]) -> Vec<ApiMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            result.push(ApiMessage::text("system", system));
        }

        for m in messages {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
                Role::Tool => "tool",
            };
            result.push(ApiMessage {
                role: role.into(),
                // Assistant turns that only call tools carry null content.
                content: if m.role == Role::Assistant && m.content.is_empty() && !m.tool_calls.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: Value::Object(tc.arguments.clone()).to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            });
        }
        result
    }

    fn to_api_tools(tools: &[ToolSchema]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// The request body for one concrete model id.
    pub fn build_body(request: &TurnRequest, model: &str) -> Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(request.system.as_deref(), &request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!("auto");
        }
        body
    }

    /// Normalize a chat-completions response body.
    pub fn parse_reply(body: &Value) -> Result<TurnReply, ProviderError> {
        let resp: ApiResponse = serde_json::from_value(body.clone())
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse completion response: {e}")))?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                arguments: parse_arguments(&tc.function.name, &tc.function.arguments),
                id: tc.id,
                name: tc.function.name,
            })
            .collect();

        Ok(TurnReply {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            model: resp.model,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }

    async fn send_once(&self, request: &TurnRequest, model: String) -> Result<TurnReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(request, &model);

        debug!(provider = %self.name, model = %model, tools = request.tools.len(), "Sending turn");

        let headers = [("authorization", format!("Bearer {}", self.api_key))];
        let response = self.transport.post_json(&url, &headers, &body).await?;

        if !response.is_success() {
            warn!(provider = %self.name, status = response.status, model = %model, "Completion API error");
            return Err(classify_error(&self.name, &response));
        }

        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Self::parse_reply(&value)
    }
}

/// Tool arguments arrive as a JSON string; anything unparseable becomes `{}`.
fn parse_arguments(tool: &str, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(tool, raw, "Unparseable tool arguments, using empty object");
            Map::new()
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> ProviderStyle {
        ProviderStyle::Completion
    }

    async fn send_turn(&self, request: TurnRequest) -> Result<TurnReply, ProviderError> {
        let candidates = self.aliases.candidates(&request.model);
        try_candidates(&self.name, &candidates, |model| self.send_once(&request, model)).await
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

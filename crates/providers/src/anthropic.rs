//! Message-style provider: Anthropic's Messages API.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//! - Tool use with `tool_use` / `tool_result` content blocks
//!
//! Consecutive tool results are folded into a single user turn, one
//! `tool_result` block per call. When a request declares no tools, earlier
//! tool exchanges are rendered as plain text instead, since the API rejects
//! tool blocks without matching declarations.

use async_trait::async_trait;
use openmud_core::error::ProviderError;
use openmud_core::message::{Message, Role, ToolCallRequest};
use openmud_core::provider::{Provider, ProviderStyle, TurnReply, TurnRequest, Usage};
use openmud_core::tool::ToolSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fallback::{ModelAliases, try_candidates};
use crate::transport::{ReqwestTransport, Transport, classify_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    transport: Arc<dyn Transport>,
    aliases: ModelAliases,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            transport: Arc::new(ReqwestTransport::default()),
            aliases: ModelAliases::default(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_aliases(mut self, aliases: ModelAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// Merge the request's system prompt with any system messages in the buffer.
    fn extract_system(request: &TurnRequest) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = request.system.as_deref().into_iter().collect();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    /// Convert the buffer to content-block messages.
    fn to_api_messages(messages: &[&Message], tools_declared: bool) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::User => result.push(AnthropicMessage::text("user", &msg.content)),
                Role::Assistant if msg.tool_calls.is_empty() => {
                    result.push(AnthropicMessage::text("assistant", &msg.content));
                }
                Role::Assistant if !tools_declared => {
                    result.push(AnthropicMessage::text("assistant", &flatten_calls(msg)));
                }
                Role::Assistant => {
                    let mut blocks: Vec<ContentBlock> = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(ContentBlock::Text { text: msg.content.clone() });
                    }
                    for tc in &msg.tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: Value::Object(tc.arguments.clone()),
                        });
                    }
                    result.push(AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Blocks(blocks),
                    });
                }
                Role::Tool => {
                    let block = if tools_declared {
                        ContentBlock::ToolResult {
                            tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                            content: msg.content.clone(),
                            is_error: msg.is_error,
                        }
                    } else {
                        ContentBlock::Text { text: flatten_result(msg) }
                    };
                    // Fold into the previous tool-result turn if there is one.
                    match result.last_mut() {
                        Some(AnthropicMessage {
                            role,
                            content: AnthropicContent::Blocks(blocks),
                        }) if role.as_str() == "user" => blocks.push(block),
                        _ => result.push(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Blocks(vec![block]),
                        }),
                    }
                }
                Role::System => {} // handled separately
            }
        }

        result
    }

    fn to_api_tools(tools: &[ToolSchema]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    /// The request body for one concrete model id.
    pub fn build_body(request: &TurnRequest, model: &str) -> Value {
        let (system, messages) = Self::extract_system(request);
        let tools_declared = !request.tools.is_empty();

        let mut body = serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(&messages, tools_declared),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }
        if tools_declared {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }

    /// Normalize a Messages API response body.
    pub fn parse_reply(body: &Value) -> Result<TurnReply, ProviderError> {
        let resp: AnthropicResponse = serde_json::from_value(body.clone())
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse Anthropic response: {e}")))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text: part } => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&part);
                }
                ResponseContentBlock::ToolUse { id, name, input } => {
                    let arguments = match input {
                        Value::Object(map) => map,
                        Value::Null => Default::default(),
                        other => {
                            warn!(tool = %name, input = %other, "Non-object tool input, ignoring");
                            Default::default()
                        }
                    };
                    tool_calls.push(ToolCallRequest { id, name, arguments });
                }
                ResponseContentBlock::Other => {}
            }
        }

        Ok(TurnReply {
            text,
            tool_calls,
            model: resp.model,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }

    async fn send_once(&self, request: &TurnRequest, model: String) -> Result<TurnReply, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(request, &model);

        debug!(provider = "anthropic", model = %model, tools = request.tools.len(), "Sending turn");

        let headers = [
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        let response = self.transport.post_json(&url, &headers, &body).await?;

        if !response.is_success() {
            warn!(status = response.status, model = %model, "Anthropic API error");
            return Err(classify_error("Anthropic", &response));
        }

        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Self::parse_reply(&value)
    }
}

fn flatten_calls(msg: &Message) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !msg.content.is_empty() {
        parts.push(msg.content.clone());
    }
    for tc in &msg.tool_calls {
        parts.push(format!("[called tool {} with {}]", tc.name, Value::Object(tc.arguments.clone())));
    }
    parts.join("\n")
}

fn flatten_result(msg: &Message) -> String {
    let label = if msg.is_error { "Tool error" } else { "Tool result" };
    format!("{label}: {}", msg.content)
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn style(&self) -> ProviderStyle {
        ProviderStyle::Message
    }

    async fn send_turn(&self, request: TurnRequest) -> Result<TurnReply, ProviderError> {
        let candidates = self.aliases.candidates(&request.model);
        try_candidates(&self.name, &candidates, |model| self.send_once(&request, model)).await
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

impl AnthropicMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: AnthropicContent::Text(content.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

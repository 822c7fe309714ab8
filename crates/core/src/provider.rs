//! Provider trait: the abstraction over LLM backends.
//!
//! A provider takes one [`TurnRequest`] (system prompt, message buffer, tool
//! declarations) and returns one normalized [`TurnReply`]. How the vendor
//! encodes tool calls and tool results is the provider's business; the agent
//! loop only ever sees the normalized shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCallRequest};
use crate::tool::ToolSchema;

/// The two wire dialects openmud speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStyle {
    /// Content-block dialect: top-level system field, `tool_use` / `tool_result` blocks.
    Message,
    /// Chat-completion dialect: system as first message, `tool_calls` with string arguments.
    Completion,
}

/// One request to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// The concrete model id to ask for
    pub model: String,

    /// System prompt, sent the way the dialect expects it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The conversation buffer, oldest first
    pub messages: Vec<Message>,

    /// Tool declarations; empty means the request carries no tool fields at all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl TurnRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            tools: Vec::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// The normalized reply for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnReply {
    /// Concatenated text output (may be empty when the model only calls tools)
    pub text: String,

    /// Tool invocations requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Which model actually responded
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The core Provider trait.
///
/// Implemented by the message-style and completion-style adapters, and by
/// scripted providers in tests.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A short name used for routing, logging and telemetry (e.g. "anthropic").
    fn name(&self) -> &str;

    /// The wire dialect this provider speaks.
    fn style(&self) -> ProviderStyle {
        ProviderStyle::Completion
    }

    /// Send one turn and return the normalized reply.
    async fn send_turn(&self, request: TurnRequest) -> std::result::Result<TurnReply, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turn_request_defaults() {
        let req = TurnRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, 1024);
        assert!(req.system.is_none());
    }

    #[test]
    fn empty_tools_are_not_serialized() {
        let req = TurnRequest::new("gpt-4o-mini", vec![]);
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn provider_style_serializes_snake_case() {
        assert_eq!(serde_json::to_value(ProviderStyle::Completion).unwrap(), json!("completion"));
    }
}

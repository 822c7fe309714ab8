//! Tool types: declarations the model sees, handlers that run, results that
//! flow back into the conversation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::message::Message;

/// A tool declaration sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The canonical tool name
    pub name: String,

    /// Description of what the tool does
    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the tool's parameters
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Who asked for a tool call. Used for telemetry attribution only.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub provider: String,
    pub model: String,
}

impl ToolContext {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

/// One executable tool behind the dispatcher.
///
/// Local builders and remote compute tools both implement this; the
/// dispatcher looks handlers up by canonical name.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The canonical name this handler answers to.
    fn name(&self) -> &str;

    /// Run the tool with already-parsed arguments.
    async fn call(&self, arguments: &Map<String, Value>) -> std::result::Result<Value, ToolError>;
}

/// Outcome of dispatching one tool call.
#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    /// The call id this result answers
    pub call_id: String,

    /// Canonical tool name
    pub tool_name: String,

    pub outcome: std::result::Result<Value, ToolError>,

    pub latency_ms: u64,
}

impl ToolExecutionResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The tool-role message fed back to the model.
    pub fn to_message(&self) -> Message {
        match &self.outcome {
            Ok(value) => {
                let content = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Message::tool_result(&self.call_id, content, false)
            }
            Err(e) => Message::tool_result(&self.call_id, format!("Error: {e}"), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_defaults_parameters() {
        let schema: ToolSchema = serde_json::from_value(json!({"name": "build_schedule"})).unwrap();
        assert_eq!(schema.parameters["type"], "object");
        assert!(schema.description.is_empty());
    }

    #[test]
    fn success_result_becomes_json_content() {
        let result = ToolExecutionResult {
            call_id: "c1".into(),
            tool_name: "build_schedule".into(),
            outcome: Ok(json!({"duration": 21})),
            latency_ms: 3,
        };
        let msg = result.to_message();
        assert!(!msg.is_error);
        assert_eq!(msg.content, r#"{"duration":21}"#);
    }

    #[test]
    fn failed_result_is_flagged() {
        let result = ToolExecutionResult {
            call_id: "c2".into(),
            tool_name: "mystery".into(),
            outcome: Err(ToolError::Unsupported("mystery".into())),
            latency_ms: 0,
        };
        let msg = result.to_message();
        assert!(msg.is_error);
        assert!(msg.content.starts_with("Error: Unsupported tool"));
        assert_eq!(msg.tool_call_id.as_deref(), Some("c2"));
    }
}

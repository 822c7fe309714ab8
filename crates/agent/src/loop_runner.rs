//! The bounded tool-calling loop.
//!
//! Each step sends the conversation buffer to the provider. If the reply asks
//! for tools, every requested call runs to completion, the results are appended
//! and the loop advances. After `max_steps` steps one last call is made with no
//! tools declared, and whatever text it returns is the answer.

use futures::future::join_all;
use openmud_core::error::ProviderError;
use openmud_core::message::{Message, Role};
use openmud_core::provider::{Provider, TurnReply, TurnRequest};
use openmud_core::tool::{ToolContext, ToolSchema};
use openmud_tools::ToolDispatcher;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_STEPS: usize = 6;
pub const EMPTY_RESPONSE: &str = "No response.";

/// What the loop produced.
#[derive(Debug, Clone, Default)]
pub struct LoopOutcome {
    /// Final text, never empty
    pub text: String,

    /// Canonical names of tools that succeeded at least once
    pub tools_used: BTreeSet<String>,

    pub had_tool_error: bool,

    /// Tool calls executed
    pub tool_calls: usize,

    /// Tool calls that failed
    pub tool_errors: usize,

    /// Provider round-trips made, including the forced final one
    pub provider_calls: usize,

    /// Whether the step budget ran out
    pub hit_step_limit: bool,

    /// The conversation buffer as it stood when the loop ended
    pub messages: Vec<Message>,
}

/// Orchestrates provider turns and tool execution for one request.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<ToolDispatcher>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_steps: usize,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, dispatcher: Arc<ToolDispatcher>, model: impl Into<String>) -> Self {
        Self {
            provider,
            dispatcher,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1024,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Set the number of tool-calling steps before the forced final call.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Run the loop over `messages`.
    ///
    /// Tools are declared only when `tools` is non-empty; with no tools the
    /// first reply is final even if it names tool calls. Provider errors end
    /// the run and are returned unchanged. Tool errors never do.
    ///
    /// `messages` must end with a user turn.
    pub async fn run(
        &self,
        system: Option<String>,
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
    ) -> Result<LoopOutcome, ProviderError> {
        if messages.last().is_none_or(|m| m.role != Role::User) {
            return Err(ProviderError::InvalidRequest(
                "conversation must end with a user message".into(),
            ));
        }

        let tools_enabled = !tools.is_empty();
        let ctx = ToolContext::new(self.provider.name(), &self.model);
        let mut outcome = LoopOutcome {
            messages,
            ..Default::default()
        };

        for step in 0..self.max_steps {
            let reply = self.send(&system, &outcome.messages, tools.clone()).await?;
            outcome.provider_calls += 1;

            if !tools_enabled || reply.tool_calls.is_empty() {
                if !reply.tool_calls.is_empty() {
                    debug!(count = reply.tool_calls.len(), "Ignoring tool calls, tools not enabled");
                }
                return Ok(finish(outcome, reply.text));
            }

            debug!(step, count = reply.tool_calls.len(), "Executing tool calls");
            let calls = reply.tool_calls;
            outcome
                .messages
                .push(Message::assistant_with_calls(reply.text, calls.clone()));

            let results = join_all(calls.iter().map(|call| self.dispatcher.execute_call(call, &ctx))).await;
            for result in results {
                outcome.tool_calls += 1;
                if result.is_success() {
                    outcome.tools_used.insert(result.tool_name.clone());
                } else {
                    outcome.tool_errors += 1;
                    outcome.had_tool_error = true;
                }
                outcome.messages.push(result.to_message());
            }
        }

        warn!(
            max_steps = self.max_steps,
            model = %self.model,
            "Step limit reached, asking for a final answer without tools"
        );
        outcome.hit_step_limit = true;
        let reply = self.send(&system, &outcome.messages, Vec::new()).await?;
        outcome.provider_calls += 1;
        Ok(finish(outcome, reply.text))
    }

    async fn send(
        &self,
        system: &Option<String>,
        messages: &[Message],
        tools: Vec<ToolSchema>,
    ) -> Result<TurnReply, ProviderError> {
        let request = TurnRequest {
            model: self.model.clone(),
            system: system.clone(),
            messages: messages.to_vec(),
            tools,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        self.provider.send_turn(request).await
    }
}

fn finish(mut outcome: LoopOutcome, text: String) -> LoopOutcome {
    outcome.text = if text.trim().is_empty() {
        EMPTY_RESPONSE.to_string()
    } else {
        text
    };
    info!(
        provider_calls = outcome.provider_calls,
        tool_calls = outcome.tool_calls,
        tool_errors = outcome.tool_errors,
        "Agent loop finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, call, text_reply, tool_reply};
    use openmud_core::message::Role;
    use openmud_telemetry::ToolTelemetry;
    use openmud_tools::builtin_schemas;

    fn dispatcher() -> Arc<ToolDispatcher> {
        Arc::new(ToolDispatcher::with_local_tools(Arc::new(ToolTelemetry::new())))
    }

    #[tokio::test]
    async fn plain_text_reply_ends_the_loop() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("Hello there")]));
        let agent = AgentLoop::new(provider.clone(), dispatcher(), "gpt-4o-mini");

        let outcome = agent
            .run(None, vec![Message::user("hi")], builtin_schemas())
            .await
            .unwrap();

        assert_eq!(outcome.text, "Hello there");
        assert_eq!(outcome.provider_calls, 1);
        assert!(outcome.tools_used.is_empty());
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn tool_results_follow_the_assistant_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply(vec![call("c1", "schedule", serde_json::json!({"duration_days": 10}))]),
            text_reply("Schedule ready"),
        ]));
        let agent = AgentLoop::new(provider.clone(), dispatcher(), "gpt-4o-mini");

        let outcome = agent
            .run(Some("sys".into()), vec![Message::user("schedule it")], builtin_schemas())
            .await
            .unwrap();

        assert_eq!(outcome.text, "Schedule ready");
        assert!(outcome.tools_used.contains("build_schedule"));
        assert!(!outcome.had_tool_error);

        let second = &provider.requests()[1];
        assert_eq!(second.system.as_deref(), Some("sys"));
        let roles: Vec<Role> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(second.messages[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn failing_call_does_not_stop_its_siblings() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply(vec![
                call("a", "mystery_tool", serde_json::json!({})),
                call("b", "build_schedule", serde_json::json!({"duration_days": 5})),
            ]),
            text_reply("done"),
        ]));
        let agent = AgentLoop::new(provider.clone(), dispatcher(), "gpt-4o-mini");

        let outcome = agent
            .run(None, vec![Message::user("go")], builtin_schemas())
            .await
            .unwrap();

        assert!(outcome.had_tool_error);
        assert_eq!(outcome.tool_calls, 2);
        assert_eq!(outcome.tool_errors, 1);
        assert_eq!(outcome.tools_used.len(), 1);

        let requests = provider.requests();
        let results: Vec<&Message> = requests[1]
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("a"));
        assert!(results[0].is_error);
        assert!(!results[1].is_error);
    }

    #[tokio::test]
    async fn step_limit_forces_a_final_call_without_tools() {
        let mut script: Vec<_> = (0..3)
            .map(|i| tool_reply(vec![call(&format!("c{i}"), "build_schedule", serde_json::json!({}))]))
            .collect();
        script.push(text_reply(""));
        let provider = Arc::new(ScriptedProvider::new(script));
        let agent = AgentLoop::new(provider.clone(), dispatcher(), "gpt-4o-mini").with_max_steps(3);

        let outcome = agent
            .run(None, vec![Message::user("loop forever")], builtin_schemas())
            .await
            .unwrap();

        assert!(outcome.hit_step_limit);
        assert_eq!(outcome.provider_calls, 4);
        assert_eq!(outcome.text, EMPTY_RESPONSE);
        let requests = provider.requests();
        assert!(requests[..3].iter().all(|r| !r.tools.is_empty()));
        assert!(requests[3].tools.is_empty());
    }

    #[tokio::test]
    async fn without_tools_calls_in_the_reply_are_ignored() {
        let provider = Arc::new(ScriptedProvider::new(vec![TurnReply {
            text: "I would call a tool".into(),
            tool_calls: vec![call("x", "build_schedule", serde_json::json!({}))],
            ..Default::default()
        }]));
        let dispatcher = dispatcher();
        let agent = AgentLoop::new(provider, dispatcher.clone(), "gpt-4o-mini");

        let outcome = agent.run(None, vec![Message::user("hi")], Vec::new()).await.unwrap();

        assert_eq!(outcome.text, "I would call a tool");
        assert_eq!(outcome.tool_calls, 0);
        assert_eq!(dispatcher.telemetry().snapshot().totals.tool_invocations, 0);
    }

    #[tokio::test]
    async fn buffer_must_end_with_a_user_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("unreachable")]));
        let agent = AgentLoop::new(provider.clone(), dispatcher(), "gpt-4o-mini");

        for messages in [Vec::new(), vec![Message::user("hi"), Message::assistant("hello")]] {
            let err = agent.run(None, messages, builtin_schemas()).await.unwrap_err();
            assert!(matches!(err, ProviderError::InvalidRequest(_)));
        }
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        })]));
        let agent = AgentLoop::new(provider, dispatcher(), "gpt-4o-mini");

        let err = agent
            .run(None, vec![Message::user("hi")], builtin_schemas())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }
}

//! Tool dispatcher: name normalization, routing, timing, telemetry.
//!
//! Every call through [`ToolDispatcher::execute`] produces exactly one
//! telemetry sample, whether the tool succeeded, failed, or does not exist.

use openmud_core::error::ToolError;
use openmud_core::message::ToolCallRequest;
use openmud_core::tool::{ToolContext, ToolExecutionResult, ToolHandler};
use openmud_telemetry::{ToolInvocationEvent, ToolTelemetry};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::compute::{ComputeClient, RemoteTool};
use crate::names::{REMOTE_TOOLS, canonical};
use crate::proposal::ProposalTool;
use crate::schedule::ScheduleTool;

pub struct ToolDispatcher {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    telemetry: Arc<ToolTelemetry>,
}

impl ToolDispatcher {
    /// An empty dispatcher. Every call fails as unsupported until handlers are registered.
    pub fn new(telemetry: Arc<ToolTelemetry>) -> Self {
        Self {
            handlers: HashMap::new(),
            telemetry,
        }
    }

    /// Dispatcher with the local schedule and proposal builders.
    pub fn with_local_tools(telemetry: Arc<ToolTelemetry>) -> Self {
        let mut dispatcher = Self::new(telemetry);
        dispatcher.register(Arc::new(ScheduleTool::new()));
        dispatcher.register(Arc::new(ProposalTool));
        dispatcher
    }

    /// Route the estimation tools to a compute service.
    pub fn with_compute(mut self, client: Arc<dyn ComputeClient>) -> Self {
        for name in REMOTE_TOOLS {
            self.register(Arc::new(RemoteTool::new(name, Arc::clone(&client))));
        }
        self
    }

    /// Register a handler under its canonical name. Replaces any existing one.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = canonical(handler.name()).to_string();
        self.handlers.insert(name, handler);
    }

    pub fn supports(&self, name: &str) -> bool {
        self.handlers.contains_key(canonical(name))
    }

    /// Registered canonical names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn telemetry(&self) -> &Arc<ToolTelemetry> {
        &self.telemetry
    }

    /// Run one tool by name.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let (_, outcome, _) = self.run(name, arguments, ctx).await;
        outcome
    }

    /// Run one model-requested call, keeping its id for the tool-result message.
    pub async fn execute_call(&self, call: &ToolCallRequest, ctx: &ToolContext) -> ToolExecutionResult {
        let (tool_name, outcome, latency_ms) = self.run(&call.name, &call.arguments, ctx).await;
        ToolExecutionResult {
            call_id: call.id.clone(),
            tool_name,
            outcome,
            latency_ms,
        }
    }

    async fn run(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        ctx: &ToolContext,
    ) -> (String, Result<Value, ToolError>, u64) {
        let tool_name = canonical(name).to_string();
        let started = Instant::now();

        let outcome = match self.handlers.get(&tool_name) {
            Some(handler) => handler.call(arguments).await,
            None => Err(ToolError::Unsupported(name.to_string())),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(_) => debug!(tool = %tool_name, latency_ms, "Tool succeeded"),
            Err(e) => warn!(tool = %tool_name, latency_ms, error = %e, "Tool failed"),
        }

        self.telemetry.record_tool_invocation(ToolInvocationEvent {
            provider: ctx.provider.clone(),
            model: ctx.model.clone(),
            tool_name: tool_name.clone(),
            success: outcome.is_ok(),
            latency_ms,
            error: outcome.as_ref().err().map(ToString::to_string),
        });

        (tool_name, outcome, latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingCompute;

    #[async_trait]
    impl ComputeClient for FailingCompute {
        async fn run(&self, tool_name: &str, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: tool_name.into(),
                reason: "compute offline".into(),
            })
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new("openai", "gpt-4o-mini")
    }

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::with_local_tools(Arc::new(ToolTelemetry::new()))
    }

    #[tokio::test]
    async fn aliases_route_to_canonical_handler() {
        let d = dispatcher();
        let args = json!({"client": "Acme", "scope": "Sewer", "total": 10}).as_object().unwrap().clone();
        let out = d.execute("generate_proposal", &args, &ctx()).await.unwrap();
        assert_eq!(out["client"], "Acme");

        let snap = d.telemetry().snapshot();
        assert_eq!(snap.by_tool["render_proposal_html"].success, 1);
        assert_eq!(snap.by_provider.len(), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_unsupported_and_recorded() {
        let d = dispatcher();
        let err = d.execute("launch_rocket", &Map::new(), &ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::Unsupported(n) if n == "launch_rocket"));

        let snap = d.telemetry().snapshot();
        assert_eq!(snap.totals.tool_invocations_error, 1);
        assert_eq!(snap.recent_errors[0].tool_name.as_deref(), Some("launch_rocket"));
        assert_eq!(snap.recent_errors[0].model.as_deref(), Some("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn remote_tools_need_a_compute_client() {
        let d = dispatcher();
        assert!(!d.supports("estimate_project_cost"));

        let d = d.with_compute(Arc::new(FailingCompute));
        assert!(d.supports("estimate"));
        let err = d.execute("estimate_project_cost", &Map::new(), &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("compute offline"));
        assert_eq!(d.names().len(), 6);
    }

    #[tokio::test]
    async fn execute_call_keeps_call_id() {
        let d = dispatcher();
        let call = ToolCallRequest::new("call_42", "schedule", Map::new());
        let result = d.execute_call(&call, &ctx()).await;
        assert_eq!(result.call_id, "call_42");
        assert_eq!(result.tool_name, "build_schedule");
        assert!(result.is_success());
    }
}

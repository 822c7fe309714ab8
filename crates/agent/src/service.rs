//! The chat facade: one request in, one reply out.
//!
//! `ChatService` owns the long-lived pieces (provider router, schema cache,
//! dispatcher, telemetry recorder) and wires a fresh [`AgentLoop`] per
//! request. It is built once at startup and shared behind an `Arc`.

use chrono::{Local, NaiveDate};
use openmud_config::AppConfig;
use openmud_core::error::ProviderError;
use openmud_core::message::{Message, Role};
use openmud_core::tool::ToolSchema;
use openmud_providers::router::{ProviderRouter, build_from_config};
use openmud_telemetry::{ChatRunEvent, ToolTelemetry};
use openmud_tools::names::canonical;
use openmud_tools::{ToolDispatcher, ToolSchemaCache, dispatcher_from_config, schema_cache_from_config};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, info_span, warn};

use crate::blocks::{BlockInjector, EstimateContext, InjectionContext, apply_all, default_injectors};
use crate::loop_runner::{AgentLoop, DEFAULT_MAX_STEPS};
use crate::prompts::merge_system;

/// A chat request as the client sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Requested model id; the configured default when absent
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_use_tools")]
    pub use_tools: bool,

    /// Restrict the declared tools to these names (aliases allowed)
    #[serde(default)]
    pub available_tools: Option<Vec<String>>,

    #[serde(default)]
    pub estimate_context: Option<EstimateContext>,
}

fn default_use_tools() -> bool {
    true
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            use_tools: true,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn without_tools(mut self) -> Self {
        self.use_tools = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Never empty
    pub response: String,

    /// Canonical names of tools that succeeded, sorted
    pub tools_used: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ChatError {
    /// Short message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::InvalidRequest(m) | ChatError::Provider(ProviderError::InvalidRequest(m)) => m.clone(),
            ChatError::Provider(ProviderError::AuthenticationFailed(_)) => {
                "Invalid API key. Check your provider key configuration.".into()
            }
            ChatError::Provider(ProviderError::RateLimited { .. }) => {
                "Rate limit exceeded. Try again in a moment.".into()
            }
            ChatError::Provider(ProviderError::ModelNotFound(_)) => {
                "Model not available. Try a different model.".into()
            }
            ChatError::Provider(ProviderError::NotConfigured(m)) => m.clone(),
            ChatError::Provider(e) => e.to_string(),
        }
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            ChatError::InvalidRequest(_) | ChatError::Provider(ProviderError::InvalidRequest(_))
        )
    }
}

/// Request defaults and limits.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub default_model: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    pub max_tokens_cap: u32,
    pub max_steps: usize,
    pub timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".into(),
            default_temperature: 0.7,
            default_max_tokens: 1024,
            max_tokens_cap: 4096,
            max_steps: DEFAULT_MAX_STEPS,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_model: config.default_model.clone(),
            default_temperature: config.default_temperature,
            default_max_tokens: config.default_max_tokens,
            max_tokens_cap: config.max_tokens_cap,
            max_steps: config.agent.max_steps,
            timeout: Duration::from_secs(config.agent.request_timeout_secs),
        }
    }
}

pub struct ChatService {
    router: ProviderRouter,
    cache: Arc<ToolSchemaCache>,
    dispatcher: Arc<ToolDispatcher>,
    telemetry: Arc<ToolTelemetry>,
    injectors: Vec<Box<dyn BlockInjector>>,
    settings: ChatSettings,
    today: fn() -> NaiveDate,
}

impl ChatService {
    /// Telemetry is shared with the dispatcher so tool and run samples land
    /// in one recorder.
    pub fn new(router: ProviderRouter, cache: Arc<ToolSchemaCache>, dispatcher: Arc<ToolDispatcher>) -> Self {
        let telemetry = Arc::clone(dispatcher.telemetry());
        Self {
            router,
            cache,
            dispatcher,
            telemetry,
            injectors: default_injectors(),
            settings: ChatSettings::default(),
            today: || Local::now().date_naive(),
        }
    }

    /// Build every collaborator from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let telemetry = Arc::new(ToolTelemetry::with_recent_capacity(config.telemetry.recent_errors));
        let dispatcher = Arc::new(dispatcher_from_config(config, telemetry));
        let cache = Arc::new(schema_cache_from_config(config));
        Self::new(build_from_config(config), cache, dispatcher).with_settings(ChatSettings::from_config(config))
    }

    pub fn with_settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_injectors(mut self, injectors: Vec<Box<dyn BlockInjector>>) -> Self {
        self.injectors = injectors;
        self
    }

    /// Fix the start date used for synthesized schedules.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn telemetry(&self) -> &Arc<ToolTelemetry> {
        &self.telemetry
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let ChatRequest {
            mut messages,
            model,
            temperature,
            max_tokens,
            use_tools,
            available_tools,
            estimate_context,
        } = request;

        if messages.is_empty() {
            return Err(ChatError::InvalidRequest("messages array required".into()));
        }
        let client_system = if messages.first().is_some_and(|m| m.role == Role::System) {
            Some(messages.remove(0).content)
        } else {
            None
        };
        let last_user_message = match messages.last() {
            Some(m) if m.role == Role::User => m.content.clone(),
            _ => return Err(ChatError::InvalidRequest("Last message must be from user".into())),
        };

        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_model.clone());
        let route = self.router.resolve(&model)?;
        let system = merge_system(&model, client_system.as_deref());

        let tools = if use_tools {
            self.load_tools(available_tools.as_deref()).await
        } else {
            Vec::new()
        };

        let max_tokens = max_tokens
            .unwrap_or(self.settings.default_max_tokens)
            .min(self.settings.max_tokens_cap);
        let agent = AgentLoop::new(Arc::clone(&route.provider), Arc::clone(&self.dispatcher), route.model.clone())
            .with_max_steps(self.settings.max_steps)
            .with_temperature(temperature.unwrap_or(self.settings.default_temperature))
            .with_max_tokens(max_tokens);

        let request_id = uuid::Uuid::new_v4();
        info!(
            request_id = %request_id,
            model = %model,
            provider = %route.provider.name(),
            tools = tools.len(),
            "Chat request"
        );

        let run = agent
            .run(Some(system), messages.clone(), tools)
            .instrument(info_span!("chat", request_id = %request_id));
        let result = match tokio::time::timeout(self.settings.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "no reply within {}s",
                self.settings.timeout.as_secs()
            ))),
        };

        let mut event = ChatRunEvent {
            provider: route.provider.name().to_string(),
            model: route.model.clone(),
            tools_enabled: use_tools,
            ..Default::default()
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, model = %model, "Chat request failed");
                event.fallback_without_tools = use_tools;
                self.telemetry.record_chat_run(event);
                return Err(e.into());
            }
        };

        event.tool_calls = outcome.tool_calls;
        event.tool_errors = outcome.tool_errors;
        event.fallback_without_tools = use_tools && outcome.tools_used.is_empty();
        self.telemetry.record_chat_run(event);

        let ctx = InjectionContext::new(last_user_message, use_tools, (self.today)())
            .with_history(messages)
            .with_estimate(estimate_context)
            .with_tools_used(outcome.tools_used.clone());
        let response = apply_all(&self.injectors, &outcome.text, &ctx);

        Ok(ChatResponse {
            response,
            tools_used: outcome.tools_used.into_iter().collect(),
        })
    }

    /// Declarations to expose, or none when the registry is unreachable.
    async fn load_tools(&self, available: Option<&[String]>) -> Vec<ToolSchema> {
        let all = match self.cache.get_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Tool registry unavailable, continuing without tools");
                return Vec::new();
            }
        };
        match available {
            None => (*all).clone(),
            Some(names) => {
                let wanted: BTreeSet<&str> = names.iter().map(|n| canonical(n)).collect();
                all.iter().filter(|t| wanted.contains(t.name.as_str())).cloned().collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, text_reply};
    use openmud_core::provider::ProviderStyle;
    use openmud_tools::BuiltinSchemaSource;

    fn service(provider: Arc<ScriptedProvider>) -> ChatService {
        let telemetry = Arc::new(ToolTelemetry::new());
        let router = ProviderRouter::new().with(ProviderStyle::Completion, provider);
        ChatService::new(
            router,
            Arc::new(ToolSchemaCache::new(Arc::new(BuiltinSchemaSource))),
            Arc::new(ToolDispatcher::with_local_tools(telemetry)),
        )
        .with_today(|| NaiveDate::from_ymd_opt(2025, 3, 3).unwrap())
    }

    #[tokio::test]
    async fn rejects_empty_and_non_user_tail() {
        let svc = service(Arc::new(ScriptedProvider::new(vec![])));

        let err = svc.chat(ChatRequest::new(vec![])).await.unwrap_err();
        assert!(err.is_invalid_request());
        assert_eq!(err.user_message(), "messages array required");

        let err = svc
            .chat(ChatRequest::new(vec![Message::user("hi"), Message::assistant("hello")]))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Last message must be from user");
    }

    #[tokio::test]
    async fn client_system_message_joins_the_model_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]));
        let svc = service(provider.clone());

        let reply = svc
            .chat(
                ChatRequest::new(vec![Message::system("Crew of four."), Message::user("hello")])
                    .with_model("mud1")
                    .without_tools(),
            )
            .await
            .unwrap();
        assert_eq!(reply.response, "ok");

        let request = &provider.requests()[0];
        assert_eq!(request.model, "gpt-4o-mini");
        let system = request.system.as_deref().unwrap();
        assert!(system.starts_with("You are mud1"));
        assert!(system.ends_with("\n\nCrew of four."));
        assert!(request.messages.iter().all(|m| m.role != Role::System));
        assert!(request.tools.is_empty());
    }

    #[tokio::test]
    async fn available_tools_filter_accepts_aliases() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]));
        let svc = service(provider.clone());

        let mut request = ChatRequest::new(vec![Message::user("hello")]);
        request.available_tools = Some(vec!["schedule".into()]);
        svc.chat(request).await.unwrap();

        let names: Vec<String> = provider.requests()[0].tools.iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["build_schedule"]);
    }

    #[tokio::test]
    async fn max_tokens_is_capped() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]));
        let svc = service(provider.clone());

        let mut request = ChatRequest::new(vec![Message::user("hello")]);
        request.max_tokens = Some(100_000);
        svc.chat(request).await.unwrap();
        assert_eq!(provider.requests()[0].max_tokens, 4096);
    }

    #[tokio::test]
    async fn unconfigured_provider_is_reported() {
        let svc = service(Arc::new(ScriptedProvider::new(vec![])));
        let err = svc
            .chat(ChatRequest::new(vec![Message::user("hi")]).with_model("claude-sonnet-4-6"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Anthropic API key not configured");
    }

    #[tokio::test]
    async fn provider_failure_is_recorded_and_mapped() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        })]));
        let svc = service(provider);

        let err = svc.chat(ChatRequest::new(vec![Message::user("hi")])).await.unwrap_err();
        assert_eq!(err.user_message(), "Rate limit exceeded. Try again in a moment.");

        let totals = svc.telemetry().snapshot().totals;
        assert_eq!(totals.chat_runs, 1);
        assert_eq!(totals.chat_runs_fallback_without_tools, 1);
    }

    #[test]
    fn request_defaults_from_json() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        assert!(req.use_tools);
        assert!(req.model.is_none());
        assert!(req.estimate_context.is_none());
    }

    #[test]
    fn user_messages_for_provider_errors() {
        let auth = ChatError::from(ProviderError::AuthenticationFailed("bad".into()));
        assert!(auth.user_message().starts_with("Invalid API key"));
        let missing = ChatError::from(ProviderError::ModelNotFound("gpt-9".into()));
        assert_eq!(missing.user_message(), "Model not available. Try a different model.");
    }
}

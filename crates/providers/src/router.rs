//! Provider router: picks the dialect for a requested model.
//!
//! `claude-*` ids go to the message-style provider. `mud1` is the house
//! assistant and runs on the completion-style provider as `gpt-4o-mini`.
//! Everything else is assumed to be completion-style.

use openmud_core::error::ProviderError;
use openmud_core::provider::{Provider, ProviderStyle};
use std::sync::Arc;

use crate::anthropic::AnthropicProvider;
use crate::fallback::ModelAliases;
use crate::openai_compat::OpenAiCompatProvider;
use crate::transport::ReqwestTransport;

/// The house model name.
pub const HOUSE_MODEL: &str = "mud1";
const HOUSE_BACKING_MODEL: &str = "gpt-4o-mini";

/// Where one request goes.
#[derive(Clone)]
pub struct Route {
    pub provider: Arc<dyn Provider>,
    pub style: ProviderStyle,
    /// Model id to send (before alias expansion inside the adapter)
    pub model: String,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("provider", &self.provider.name())
            .field("style", &self.style)
            .field("model", &self.model)
            .finish()
    }
}

/// Routes chat requests to the correct provider.
#[derive(Default)]
pub struct ProviderRouter {
    message: Option<Arc<dyn Provider>>,
    completion: Option<Arc<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the provider serving one dialect. Replaces any existing one.
    pub fn register(&mut self, style: ProviderStyle, provider: Arc<dyn Provider>) {
        match style {
            ProviderStyle::Message => self.message = Some(provider),
            ProviderStyle::Completion => self.completion = Some(provider),
        }
    }

    pub fn with(mut self, style: ProviderStyle, provider: Arc<dyn Provider>) -> Self {
        self.register(style, provider);
        self
    }

    /// Dialect and outgoing model id for a requested model.
    pub fn classify(requested: &str) -> (ProviderStyle, String) {
        if requested.starts_with("claude-") {
            (ProviderStyle::Message, requested.to_string())
        } else if requested == HOUSE_MODEL {
            (ProviderStyle::Completion, HOUSE_BACKING_MODEL.to_string())
        } else {
            (ProviderStyle::Completion, requested.to_string())
        }
    }

    pub fn resolve(&self, requested: &str) -> Result<Route, ProviderError> {
        let (style, model) = Self::classify(requested);
        let provider = match style {
            ProviderStyle::Message => self.message.clone(),
            ProviderStyle::Completion => self.completion.clone(),
        }
        .ok_or_else(|| {
            ProviderError::NotConfigured(match style {
                ProviderStyle::Message => "Anthropic API key not configured".to_string(),
                ProviderStyle::Completion => "OpenAI API key not configured".to_string(),
            })
        })?;

        Ok(Route { provider, style, model })
    }

    /// Names of the registered providers.
    pub fn list(&self) -> Vec<&str> {
        [&self.message, &self.completion]
            .into_iter()
            .flatten()
            .map(|p| p.name())
            .collect()
    }
}

/// Build providers from configuration. Dialects without an API key stay unregistered.
pub fn build_from_config(config: &openmud_config::AppConfig) -> ProviderRouter {
    let aliases = ModelAliases::new(config.models.aliases.clone());
    let transport = Arc::new(ReqwestTransport::new(std::time::Duration::from_secs(
        config.agent.request_timeout_secs.max(1),
    )));
    let mut router = ProviderRouter::new();

    let anthropic = &config.providers.anthropic;
    if let Some(key) = &anthropic.api_key {
        let mut p = AnthropicProvider::new(key)
            .with_transport(transport.clone())
            .with_aliases(aliases.clone());
        if let Some(url) = &anthropic.api_url {
            p = p.with_base_url(url);
        }
        router.register(ProviderStyle::Message, Arc::new(p));
    }

    let openai = &config.providers.openai;
    if let Some(key) = &openai.api_key {
        let base_url = openai
            .api_url
            .clone()
            .unwrap_or_else(|| crate::openai_compat::DEFAULT_BASE_URL.to_string());
        let p = OpenAiCompatProvider::new("openai", base_url, key)
            .with_transport(transport)
            .with_aliases(aliases);
        router.register(ProviderStyle::Completion, Arc::new(p));
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_models() {
        assert_eq!(
            ProviderRouter::classify("claude-sonnet-4-6"),
            (ProviderStyle::Message, "claude-sonnet-4-6".to_string())
        );
        assert_eq!(
            ProviderRouter::classify("mud1"),
            (ProviderStyle::Completion, "gpt-4o-mini".to_string())
        );
        assert_eq!(
            ProviderRouter::classify("gpt-4o"),
            (ProviderStyle::Completion, "gpt-4o".to_string())
        );
    }

    #[test]
    fn unconfigured_dialect_is_an_error() {
        let router = ProviderRouter::new().with(
            ProviderStyle::Completion,
            Arc::new(OpenAiCompatProvider::openai("sk-test")),
        );
        assert!(router.resolve("mud1").is_ok());
        let err = router.resolve("claude-opus-4-6").unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(m) if m.contains("Anthropic")));
    }

    #[test]
    fn build_from_config_registers_keyed_providers() {
        let mut config = openmud_config::AppConfig::default();
        assert!(build_from_config(&config).list().is_empty());

        config.providers.anthropic.api_key = Some("sk-ant".into());
        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["anthropic"]);
        let route = router.resolve("claude-3-opus-20240229").unwrap();
        assert_eq!(route.style, ProviderStyle::Message);
        assert_eq!(route.provider.style(), ProviderStyle::Message);
    }
}

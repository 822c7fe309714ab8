//! Configuration loading, validation, and management for openmud.
//!
//! Loads configuration from `~/.openmud/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.openmud/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model used when a chat request names none
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Hard ceiling applied to any requested max_tokens
    #[serde(default = "default_max_tokens_cap")]
    pub max_tokens_cap: u32,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    /// Remote tool-schema registry
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Remote compute service for estimation tools
    #[serde(default)]
    pub compute: ComputeConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_max_tokens_cap() -> u32 {
    4096
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("max_tokens_cap", &self.max_tokens_cap)
            .field("providers", &self.providers)
            .field("models", &self.models)
            .field("agent", &self.agent)
            .field("registry", &self.registry)
            .field("compute", &self.compute)
            .field("gateway", &self.gateway)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

/// Credentials and endpoints for both provider dialects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderConfig,

    #[serde(default)]
    pub openai: ProviderConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the vendor's base URL (proxies, compatible servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Requested model id → ordered list of concrete ids to try.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, Vec<String>>,
}

fn default_aliases() -> BTreeMap<String, Vec<String>> {
    [
        ("claude-haiku-4-5-20251001", "claude-haiku-4-5-20251001"),
        ("claude-sonnet-4-6", "claude-sonnet-4-6"),
        ("claude-opus-4-6", "claude-opus-4-6"),
        ("claude-3-5-haiku-20241022", "claude-haiku-4-5-20251001"),
        ("claude-3-5-sonnet-20241022", "claude-sonnet-4-6"),
        ("claude-3-opus-20240229", "claude-opus-4-6"),
    ]
    .into_iter()
    .map(|(requested, concrete)| (requested.to_string(), vec![concrete.to_string()]))
    .collect()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            aliases: default_aliases(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool-capable model calls before the forced final answer
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Wall-clock budget for one chat request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_steps() -> usize {
    6
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// When unset, the built-in tool declarations are served instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    300
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Endpoint that executes remote tools; unset disables them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_compute_timeout")]
    pub timeout_secs: u64,
}

fn default_compute_timeout() -> u64 {
    30
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_compute_timeout(),
        }
    }
}

impl std::fmt::Debug for ComputeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Shared key guarding the metrics endpoint; unset leaves it open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Size of the recent tool-error ring buffer
    #[serde(default = "default_recent_errors")]
    pub recent_errors: usize,
}

fn default_recent_errors() -> usize {
    25
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            recent_errors: default_recent_errors(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.openmud/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`
    /// - `OPENMUD_API_KEY` (gateway metrics key)
    /// - `OPENMUD_MODEL`, `OPENMUD_REGISTRY_URL`, `OPENMUD_COMPUTE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }
        if let Some(key) = lookup("OPENMUD_API_KEY") {
            self.gateway.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENMUD_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("OPENMUD_REGISTRY_URL") {
            self.registry.url = Some(url);
        }
        if let Some(url) = lookup("OPENMUD_COMPUTE_URL") {
            self.compute.url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".openmud")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError("agent.max_steps must be at least 1".into()));
        }
        if self.max_tokens_cap == 0 {
            return Err(ConfigError::ValidationError("max_tokens_cap must be > 0".into()));
        }
        if let Some((requested, _)) = self.models.aliases.iter().find(|(_, ids)| ids.is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "model alias '{requested}' has no candidate ids"
            )));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            max_tokens_cap: default_max_tokens_cap(),
            providers: ProvidersConfig::default(),
            models: ModelsConfig::default(),
            agent: AgentConfig::default(),
            registry: RegistryConfig::default(),
            compute: ComputeConfig::default(),
            gateway: GatewayConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

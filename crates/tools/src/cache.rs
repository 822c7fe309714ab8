//! Process-wide tool schema cache.
//!
//! The full declaration list is fetched from a [`SchemaSource`], normalized
//! (aliases resolved, duplicates dropped) and kept as one immutable
//! `Arc<Vec<ToolSchema>>` until the TTL lapses. Readers never see a partially
//! refreshed list. There is no single-flight: concurrent callers that find
//! the entry expired may each fetch, and the last writer wins.

use async_trait::async_trait;
use openmud_core::error::RegistryError;
use openmud_core::tool::ToolSchema;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::names::canonical;

/// Default time-to-live for a fetched schema list.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Where tool declarations come from.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Fetch the complete list. Partial lists are not a thing.
    async fn fetch(&self) -> Result<Vec<ToolSchema>, RegistryError>;

    /// Short label for logs.
    fn describe(&self) -> String {
        "registry".into()
    }
}

struct CacheEntry {
    tools: Arc<Vec<ToolSchema>>,
    expires_at: Instant,
}

pub struct ToolSchemaCache {
    source: Arc<dyn SchemaSource>,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl ToolSchemaCache {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self::with_ttl(source, DEFAULT_TTL)
    }

    pub fn with_ttl(source: Arc<dyn SchemaSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Current tool list, refreshing it first if it is missing or expired.
    ///
    /// A failed refresh serves the previous list when there is one (and leaves
    /// it expired so the next call retries). With nothing cached, the fetch
    /// error is returned.
    pub async fn get_tools(&self) -> Result<Arc<Vec<ToolSchema>>, RegistryError> {
        let stale = {
            let entry = self.entry.read().unwrap();
            match entry.as_ref() {
                Some(e) if Instant::now() < e.expires_at => return Ok(Arc::clone(&e.tools)),
                Some(e) => Some(Arc::clone(&e.tools)),
                None => None,
            }
        };

        debug!(source = %self.source.describe(), "Refreshing tool schemas");
        match self.source.fetch().await {
            Ok(raw) => {
                let tools = Arc::new(normalize(raw));
                info!(count = tools.len(), source = %self.source.describe(), "Tool schemas refreshed");
                *self.entry.write().unwrap() = Some(CacheEntry {
                    tools: Arc::clone(&tools),
                    expires_at: Instant::now() + self.ttl,
                });
                Ok(tools)
            }
            Err(e) => match stale {
                Some(tools) => {
                    warn!(error = %e, "Tool registry refresh failed, serving stale schemas");
                    Ok(tools)
                }
                None => Err(e),
            },
        }
    }

    /// Drop the cached list; the next call fetches.
    pub fn invalidate(&self) {
        *self.entry.write().unwrap() = None;
    }
}

/// Canonicalize names and drop duplicates (first declaration wins).
fn normalize(raw: Vec<ToolSchema>) -> Vec<ToolSchema> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|mut schema| {
            let name = canonical(&schema.name).to_string();
            if name.is_empty() || !seen.insert(name.clone()) {
                return None;
            }
            schema.name = name;
            Some(schema)
        })
        .collect()
}

// ── Remote registry ───────────────────────────────────────────────────────

/// Fetches declarations from the HTTP tool registry.
///
/// Accepts `{"tools": [...]}` or a bare array; each entry may be wrapped in
/// the function-calling envelope (`{"type": "function", "function": {...}}`)
/// or be a flat `{name, description, parameters}` object.
pub struct HttpSchemaSource {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpSchemaSource {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            api_key,
            client,
        }
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn fetch(&self) -> Result<Vec<ToolSchema>, RegistryError> {
        let mut req = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(RegistryError::Status {
                status_code: status,
                message: body.chars().take(200).collect(),
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| RegistryError::Malformed(e.to_string()))?;
        parse_registry_payload(&value)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Decode a registry response body into declarations.
pub fn parse_registry_payload(value: &Value) -> Result<Vec<ToolSchema>, RegistryError> {
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| RegistryError::Malformed("missing 'tools' array".into()))?,
        _ => return Err(RegistryError::Malformed("expected an object or array".into())),
    };

    entries
        .iter()
        .map(|entry| {
            let inner = entry.get("function").unwrap_or(entry);
            serde_json::from_value::<ToolSchema>(inner.clone())
                .map_err(|e| RegistryError::Malformed(format!("bad tool entry: {e}")))
        })
        .collect()
}

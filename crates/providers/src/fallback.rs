//! Model-id fallback: one requested model, an ordered list of concrete ids.
//!
//! Vendors retire model ids; callers keep sending the old ones. Each adapter
//! walks the candidate list and only advances when the vendor says the model
//! does not exist. Every other failure is returned as-is.

use openmud_core::error::ProviderError;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{info, warn};

/// Requested model id → ordered concrete ids.
#[derive(Debug, Clone, Default)]
pub struct ModelAliases {
    table: BTreeMap<String, Vec<String>>,
}

impl ModelAliases {
    pub fn new(table: BTreeMap<String, Vec<String>>) -> Self {
        Self { table }
    }

    /// Add or replace one alias entry.
    pub fn with_alias(mut self, requested: impl Into<String>, candidates: Vec<String>) -> Self {
        self.table.insert(requested.into(), candidates);
        self
    }

    /// Ids to try for `requested`. Unknown or empty entries resolve to the id itself.
    pub fn candidates(&self, requested: &str) -> Vec<String> {
        match self.table.get(requested) {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => vec![requested.to_string()],
        }
    }
}

/// Try `attempt` with each candidate until one succeeds or fails for a reason
/// other than a missing model.
pub async fn try_candidates<T, F, Fut>(
    provider: &str,
    candidates: &[String],
    mut attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_error = ProviderError::ModelNotFound("no candidate model ids".into());

    for (i, model) in candidates.iter().enumerate() {
        if i > 0 {
            info!(provider, model = %model, attempt = i + 1, "Trying fallback model id");
        }
        match attempt(model.clone()).await {
            Ok(value) => return Ok(value),
            Err(ProviderError::ModelNotFound(reason)) => {
                warn!(provider, model = %model, reason = %reason, "Model not available");
                last_error = ProviderError::ModelNotFound(reason);
            }
            Err(other) => return Err(other),
        }
    }

    Err(last_error)
}

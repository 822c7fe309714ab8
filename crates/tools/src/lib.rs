//! Tool layer for openmud.
//!
//! - [`ToolSchemaCache`]: TTL cache over the tool registry
//! - [`ToolDispatcher`]: routes calls to local builders or the compute service
//! - [`schedule`] / [`proposal`]: the deterministic local builders

pub mod cache;
pub mod catalog;
pub mod compute;
pub mod dispatcher;
pub mod html;
pub mod names;
pub mod proposal;
pub mod schedule;

pub use cache::{HttpSchemaSource, SchemaSource, ToolSchemaCache};
pub use catalog::{BuiltinSchemaSource, builtin_schemas};
pub use compute::{ComputeClient, HttpComputeClient, RemoteTool};
pub use dispatcher::ToolDispatcher;

use openmud_config::AppConfig;
use openmud_telemetry::ToolTelemetry;
use std::sync::Arc;
use std::time::Duration;

/// Schema cache backed by the configured registry, or the built-in list.
pub fn schema_cache_from_config(config: &AppConfig) -> ToolSchemaCache {
    let ttl = Duration::from_secs(config.registry.cache_ttl_secs);
    let source: Arc<dyn SchemaSource> = match &config.registry.url {
        Some(url) => Arc::new(HttpSchemaSource::new(
            url.clone(),
            config.registry.api_key.clone(),
            Duration::from_secs(10),
        )),
        None => Arc::new(BuiltinSchemaSource),
    };
    ToolSchemaCache::with_ttl(source, ttl)
}

/// Dispatcher with local tools, plus remote tools when a compute URL is configured.
pub fn dispatcher_from_config(config: &AppConfig, telemetry: Arc<ToolTelemetry>) -> ToolDispatcher {
    let dispatcher = ToolDispatcher::with_local_tools(telemetry);
    match &config.compute.url {
        Some(url) => dispatcher.with_compute(Arc::new(HttpComputeClient::new(
            url.clone(),
            config.compute.api_key.clone(),
            Duration::from_secs(config.compute.timeout_secs),
        ))),
        None => dispatcher,
    }
}

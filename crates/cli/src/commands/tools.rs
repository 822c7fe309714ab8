//! `openmud tools`: list the tool schemas the model would see.

use openmud_config::AppConfig;
use openmud_telemetry::ToolTelemetry;
use openmud_tools::{dispatcher_from_config, schema_cache_from_config};
use std::sync::Arc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let cache = schema_cache_from_config(&config);
    let dispatcher = dispatcher_from_config(&config, Arc::new(ToolTelemetry::new()));

    let tools = cache
        .get_tools()
        .await
        .map_err(|e| format!("Tool registry unavailable: {e}"))?;

    let source = config.registry.url.as_deref().unwrap_or("built-in list");
    println!("Tools ({} from {source})", tools.len());
    println!();
    for tool in tools.iter() {
        let marker = if dispatcher.supports(&tool.name) { " " } else { "!" };
        let summary = tool.description.lines().next().unwrap_or_default();
        println!("  {marker} {:<28} {summary}", tool.name);
    }

    let unhandled = tools.iter().filter(|t| !dispatcher.supports(&t.name)).count();
    if unhandled > 0 {
        println!();
        println!("  ! {unhandled} tool(s) have no handler here (set OPENMUD_COMPUTE_URL for remote tools)");
    }

    Ok(())
}

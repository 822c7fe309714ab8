//! `openmud serve`: start the HTTP API server.

use openmud_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("openmud gateway");
    println!("   Listening:   {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:       {}", config.default_model);
    println!(
        "   Metrics key: {}",
        if config.gateway.api_key.is_some() { "required" } else { "open" }
    );

    openmud_gateway::start(config).await?;

    Ok(())
}

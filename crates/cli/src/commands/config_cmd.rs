//! `openmud config`: print the default config, its location, or check it.

use openmud_config::AppConfig;

pub fn run(path: bool, check: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path {
        println!("{}", config_path().display());
    } else if check {
        validate()?;
    } else {
        print!("{}", AppConfig::default_toml());
    }
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", config_path().display());

    let config = AppConfig::load()?;
    println!("   Config parsed and validated");

    let mut warnings = Vec::new();
    if config.providers.openai.api_key.is_none() && config.providers.anthropic.api_key.is_none() {
        warnings.push("No provider API key set (OPENAI_API_KEY or ANTHROPIC_API_KEY)");
    }
    if config.compute.url.is_none() {
        warnings.push("No compute URL set; cost tools will report unsupported");
    }
    if config.gateway.host == "0.0.0.0" && config.gateway.api_key.is_none() {
        warnings.push("Gateway bound to 0.0.0.0 with open tool metrics");
    }
    for w in &warnings {
        println!("   warning: {w}");
    }

    println!();
    println!("   Model:     {}", config.default_model);
    println!("   Max steps: {}", config.agent.max_steps);
    println!("   Registry:  {}", config.registry.url.as_deref().unwrap_or("built-in"));
    println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);

    Ok(())
}

//! `openmud chat`: send one message and print the reply.

use openmud_agent::{ChatRequest, ChatService};
use openmud_config::AppConfig;
use openmud_core::message::Message;

pub async fn run(
    message: String,
    model: Option<String>,
    no_tools: bool,
    metrics: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let service = ChatService::from_config(&config);

    if service.router().list().is_empty() {
        eprintln!();
        eprintln!("  ERROR: No provider API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY      for mud1 and gpt-* models");
        eprintln!("    ANTHROPIC_API_KEY   for claude-* models");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No provider API key found. See above for setup instructions.".into());
    }

    let mut request = ChatRequest::new(vec![Message::user(message)]);
    request.model = model;
    if no_tools {
        request = request.without_tools();
    }

    eprint!("  Thinking...");
    let result = service.chat(request).await;
    eprint!("\r              \r");

    let reply = result.map_err(|e| e.user_message())?;
    println!("{}", reply.response);
    if !reply.tools_used.is_empty() {
        eprintln!();
        eprintln!("  Tools used: {}", reply.tools_used.join(", "));
    }

    if metrics {
        println!();
        println!("{}", serde_json::to_string_pretty(&service.telemetry().snapshot())?);
    }

    Ok(())
}

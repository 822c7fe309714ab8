//! openmud CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP API
//! - `chat`    Send one message and print the reply
//! - `tools`   List the tool schemas the model would see
//! - `config`  Print the default config, its path, or check the current one

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "openmud",
    about = "openmud: construction chat assistant with estimating, scheduling and proposal tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a single message
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Model id (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,

        /// Answer without tools
        #[arg(long)]
        no_tools: bool,

        /// Print the telemetry snapshot afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// List available tools
    Tools,

    /// Show configuration
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,

        /// Load and validate the current configuration
        #[arg(long, conflicts_with = "path")]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat {
            message,
            model,
            no_tools,
            metrics,
        } => commands::chat::run(message, model, no_tools, metrics).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { path, check } => commands::config_cmd::run(path, check)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_chat_with_flags() {
        let cli = Cli::try_parse_from([
            "openmud", "-v", "chat", "-m", "price 500 LF", "--model", "mud1", "--no-tools",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Chat {
                message,
                model,
                no_tools,
                metrics,
            } => {
                assert_eq!(message, "price 500 LF");
                assert_eq!(model.as_deref(), Some("mud1"));
                assert!(no_tools);
                assert!(!metrics);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn chat_requires_a_message() {
        assert!(Cli::try_parse_from(["openmud", "chat"]).is_err());
    }

    #[test]
    fn serve_port_and_global_json_logs() {
        let cli = Cli::try_parse_from(["openmud", "serve", "--port", "8080", "--json-logs"]).unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Serve { port: Some(8080) }));
    }

    #[test]
    fn config_flags_conflict() {
        assert!(Cli::try_parse_from(["openmud", "config", "--path", "--check"]).is_err());
    }
}

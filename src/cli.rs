//! Command line interface

use clap::{Parser, Subcommand};
use tracing::info;

use crate::server::{load_config, validate_config};

/// Wayfarer travel assistant server
#[derive(Parser, Debug)]
#[command(name = "wayfarer")]
#[command(about = "Real-time conversational session server for travel booking")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Load and validate configuration, then exit
    CheckConfig,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => crate::server::run().await,
        Commands::CheckConfig => check_config(),
    }
}

fn check_config() -> anyhow::Result<()> {
    let config = load_config()?;
    validate_config(&config)?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        memory_backend = %config.memory.backend,
        credentials = config.credentials.enabled,
        tools = config.credentials.tools.len(),
        "Configuration is valid"
    );
    let mut redacted = config.clone();
    if !redacted.credentials.client_secret.is_empty() {
        redacted.credentials.client_secret = "[REDACTED]".to_string();
    }
    println!("{}", serde_json::to_string_pretty(&redacted)?);
    Ok(())
}

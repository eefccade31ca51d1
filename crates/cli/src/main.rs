//! tether CLI: the main entry point.
//!
//! Commands:
//! - `run`   : Send one message through the agent loop and print the reply
//! - `tools` : List discovered tools, or check their manifests

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tether_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tether",
    about = "tether: a tool-calling agent loop",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.tether/config.toml)
    #[arg(short, long, global = true, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to the agent and print its final reply
    Run {
        /// The message to send
        message: String,

        /// Session key (default from config)
        #[arg(short, long)]
        session: Option<String>,

        /// Override the iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// List the tools the agent can call
    Tools {
        /// Report template placeholders that match no declared parameter
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for the reply
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    match cli.command {
        Commands::Run {
            message,
            session,
            max_iterations,
        } => commands::run::run(config, message, session, max_iterations).await?,
        Commands::Tools { validate } => commands::tools::run(config, validate)?,
    }

    Ok(())
}

//! `tether run`: one message through the agent loop.

use std::sync::Arc;

use tether_agent::{AgentLoop, CancellationToken, CommandCapture, WorkspaceContextBuilder};
use tether_config::AppConfig;
use tether_core::tool::ToolExecutor;
use tether_session::FileSessionStore;
use tracing::{debug, info};

pub async fn run(
    config: AppConfig,
    message: String,
    session: Option<String>,
    max_iterations: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check for API key early: give a clear error
    if !config.has_api_key() {
        let backend_var = match config.provider.name.as_str() {
            "openai" | "gpt" => "OPENAI_API_KEY",
            _ => "ANTHROPIC_API_KEY",
        };
        eprintln!();
        eprintln!("  ERROR: No API key configured for provider '{}'!", config.provider.name);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    {backend_var}");
        eprintln!("    TETHER_API_KEY   (used for any provider)");
        eprintln!();
        eprintln!("  Or add `api_key` under [provider] in:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = tether_providers::build_provider(&config.provider)?;

    let tools = Arc::new(super::discover_tools(&config));
    debug!(tools = tools.len(), "Tools discovered");

    let context = WorkspaceContextBuilder::new(&config.context.workspace)
        .with_limits(
            config.context.bootstrap_max_chars,
            config.context.bootstrap_total_max_chars,
        )
        .with_tools(tools.definitions());

    let sessions = Arc::new(FileSessionStore::open(&config.sessions.dir));

    let mut agent = AgentLoop::new(provider, tools, sessions)
        .with_context(Arc::new(context))
        .with_max_iterations(max_iterations.unwrap_or(config.agent.max_iterations));
    if let Some(max_tokens) = config.provider.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }
    if config.capture.enabled {
        agent = agent.with_capture(Arc::new(CommandCapture::new(&config.capture.binary)));
    }

    // Ctrl-C aborts the in-flight model call or tool
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let session_key = session.unwrap_or_else(|| config.agent.session_key.clone());
    let reply = agent.run(&cancel, &session_key, &message).await?;
    println!("{reply}");

    Ok(())
}

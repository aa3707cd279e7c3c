//! replybot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use replybot::agent::{ChatDeps, EventDispatcher, EventRouter, RequestGate};
use replybot::commands::CommandContext;
use replybot::config::{Config, RuntimeConfig};
use replybot::conversation::ReplyContextStore;
use replybot::formula::HttpFormulaRenderer;
use replybot::llm::{CompletionService as _, LlmManager};
use replybot::messaging::{ConsoleAdapter, MessagingManager};
use replybot::permissions::AllowList;
use replybot::Sender;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sender id of whoever types on the local console.
const CONSOLE_OPERATOR_ID: replybot::SenderId = 0;

#[derive(Parser)]
#[command(name = "replybot")]
#[command(about = "A chat bot that threads LLM completions through quoted replies")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("starting replybot");

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_from_path(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::info!(path = %config_path.display(), model = %config.llm.chat_model, "configuration loaded");

    let llm = Arc::new(
        LlmManager::new(config.llm.clone()).context("failed to initialize LLM manager")?,
    );
    if !llm.is_available() {
        tracing::warn!("no API token configured, messages are ignored until `/token <value>` is used");
    }

    let renderer =
        HttpFormulaRenderer::new(&config.formula).context("failed to build formula renderer")?;
    let runtime_config = Arc::new(RuntimeConfig::new(&config));

    let console = Arc::new(ConsoleAdapter::new(Sender {
        id: CONSOLE_OPERATOR_ID,
        name: "operator".into(),
        is_operator: true,
    }));
    let mut messaging = MessagingManager::new();
    messaging.register_shared(console.clone());
    let messaging = Arc::new(messaging);

    let replies = Arc::new(ReplyContextStore::new(config.conversation.reply_capacity));
    let reply_capacity = replies.capacity();

    let deps = ChatDeps {
        completion: llm.clone(),
        renderer: Arc::new(renderer),
        permissions: Arc::new(
            AllowList::new(runtime_config.permissions.clone()).with_sender(CONSOLE_OPERATOR_ID),
        ),
        replies,
        gate: Arc::new(RequestGate::new()),
        messaging: messaging.clone(),
        runtime_config: runtime_config.clone(),
    };
    let router = Arc::new(EventRouter::new(deps));
    let commands = Arc::new(CommandContext {
        config_path,
        llm,
        runtime_config,
    });

    let inbound = messaging
        .start()
        .await
        .context("failed to start messaging adapters")?;

    let unhealthy = messaging.health_check().await;
    if !unhealthy.is_empty() {
        tracing::warn!(?unhealthy, "some messaging adapters are not running");
    }

    tracing::info!(
        adapters = ?messaging.adapter_names().collect::<Vec<_>>(),
        reply_capacity,
        "replybot started"
    );

    let mut dispatcher = EventDispatcher::new(router).with_commands(commands, console);

    tokio::select! {
        _ = dispatcher.run(inbound) => {
            tracing::info!("inbound streams closed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    tokio::select! {
        _ = dispatcher.drain() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("second shutdown signal, abandoning in-flight messages");
        }
    }

    tracing::info!("shutting down");
    messaging.shutdown().await;
    tracing::info!("replybot stopped");
    Ok(())
}

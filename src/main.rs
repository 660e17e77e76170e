// ABOUTME: Main entry point for the relay Slack bot
// ABOUTME: Initializes logging, config, metrics, the agent backend, and the Socket Mode listener

use anyhow::{Context, Result};
use clap::Parser;
use relay::cli::{self, Cli, Command};
use relay::platform::SlackRelay;
use relay_core::chunk::ChunkBounds;
use relay_core::{AgentRegistry, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            init_logging(cli.json_logs);
            serve().await
        }
        Command::Chunk { min, max, file } => {
            let text = cli::read_input(file.as_deref())?;
            print!("{}", cli::chunk_report(&text, ChunkBounds { min, max })?);
            Ok(())
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,relay=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

async fn serve() -> Result<()> {
    tracing::info!("Starting relay");

    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!(
        backend = %config.backend.backend_type,
        stream_output = config.features.stream_output,
        typing_status = config.features.assistant_typing_status,
        batch_size = config.delivery.batch_size,
        allowed_users = config.slack.allowed_users.len(),
        allowed_channels = config.slack.allowed_channels.len(),
        "Configuration loaded"
    );

    if let Some(listen) = &config.metrics.listen {
        let addr: SocketAddr = listen
            .parse()
            .with_context(|| format!("metrics.listen must be host:port, got: {}", listen))?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        tracing::info!(%addr, "Prometheus metrics exporter listening");
    }

    let registry = AgentRegistry::default();
    let agent = registry
        .create(&config.backend.backend_type, &config.backend.factory_config())
        .with_context(|| {
            format!(
                "Failed to create '{}' backend (available: {})",
                config.backend.backend_type,
                registry.available().join(", ")
            )
        })?;
    tracing::info!(backend = %agent.name(), "Agent backend ready");

    let slack = SlackRelay::connect(&config).await?;
    tracing::info!(bot_user = %slack.bot_user_id(), "Listening for Slack events");

    slack.serve(Arc::new(config), agent).await
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolyard::config;
use toolyard::server::Server;
use toolyard::{AcknowledgingRunner, RegistryService, SqliteStore};

#[derive(Debug, Parser)]
#[command(name = "toolyard", about = "Tool registry backend")]
struct Args {
    /// Path to the registry config file (created with defaults if absent).
    #[arg(long, default_value = "toolyard.json")]
    config: PathBuf,
    /// Override the bind address from the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = config::load_or_create(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("failed to open database {}", config.database_path.display()))?;
    let registry = RegistryService::new(Arc::new(store), Arc::new(AcknowledgingRunner));

    let mut server = Server::start(&config, registry)
        .await
        .map_err(|error| anyhow::anyhow!(error))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    server.shutdown().map_err(|error| anyhow::anyhow!(error))?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

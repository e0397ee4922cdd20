//! Sublog Server
//!
//! Run with: cargo run --bin sublog
//!
//! # Configuration
//!
//! Settings come from a TOML file (`--config`, or the default lookup
//! locations), then environment variables, then command-line flags.
//!
//! Environment variables:
//! - `PORT`: Port to listen on (default: 8080)
//! - `SQLITE_PATH`: SQLite database file
//! - `SUBLOG_HOST`: Host to bind to (default: 0.0.0.0)
//! - `SUBLOG_FRONTEND_DIR`: Directory with the bundled viewer
//! - `SUBLOG_QUEUE_CAPACITY`: Per-viewer outbound queue size (default: 256)
//! - `SUBLOG_LOG_LEVEL` / `SUBLOG_LOG_FORMAT`: Diagnostics (`RUST_LOG` wins)

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use sublog::api::{serve, AppState};
use sublog::config::{Config, ConfigOrigin};
use sublog::logging::init_logging;
use sublog::storage::LogStore;
use sublog::websocket::{Hub, HubConfig};

#[derive(Parser)]
#[command(name = "sublog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log ingestion server with a live WebSocket stream")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory with the bundled viewer
    #[arg(long)]
    frontend_dir: Option<PathBuf>,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<(Config, ConfigOrigin)> {
        let (mut config, origin) = match &self.config {
            Some(path) => (Config::load_with_env(path)?, ConfigOrigin::file(path)),
            None => Config::load_default(),
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(db) = &self.db {
            config.storage.db_path = db.clone();
        }
        if let Some(dir) = &self.frontend_dir {
            config.server.frontend_dir = dir.clone();
        }

        Ok((config, origin))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let (config, origin) = args.load_config()?;

    init_logging(&config.logging).context("failed to initialize logging")?;

    tracing::info!("Starting Sublog v{}", env!("CARGO_PKG_VERSION"));
    origin.report();
    tracing::info!("Database: {:?}", config.storage.db_path);

    let store = LogStore::open(&config.storage.db_path)
        .with_context(|| format!("failed to open database {:?}", config.storage.db_path))?;
    let store = Arc::new(store);

    let (hub, hub_task) = Hub::spawn(HubConfig::from(&config.hub));
    tracing::info!(
        queue_capacity = hub.queue_capacity(),
        "Broadcast hub started"
    );

    let state = AppState::new(Arc::clone(&store), hub, config.server.clone());
    serve(state, &config.server).await?;

    // Upgraded sockets outlive the HTTP server and may still hold hub handles
    hub_task.abort();
    tracing::info!("Sublog server stopped");

    Ok(())
}

//! tether - stateless control relay for remote agents.
//!
//! Runs the HTTP relay that agents register against and controllers poll.
//! All state lives in the configured key-value store; the process itself is
//! disposable and any number of instances can front the same store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tether::api;
use tether::config::{Config, StoreBackend};
use tether::store::{FileStore, MemoryStore, Store};

/// tether - stateless control relay for remote agents.
///
/// Agents POST registrations, heartbeats, and screen frames; controllers
/// poll targets and frames and enqueue commands for agents to execute and
/// acknowledge.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about, long_about = None)]
struct Cli {
    /// Address to bind the HTTP API server
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the file-backed store (defaults to the platform data dir)
    #[arg(long, env = "TETHER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep all relay state in memory (lost on restart)
    #[arg(long)]
    memory: bool,

    /// Per-IP request rate limit (requests per second)
    #[arg(long)]
    rate_limit: Option<u32>,
}

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?.ok_or_else(|| {
            anyhow::anyhow!("config file not found: {}", path.display())
        })?,
        None => Config::load(&default_config_path())?.unwrap_or_default(),
    };
    let server = config.server.clone().unwrap_or_default();

    let bind = cli
        .bind
        .or(server.bind)
        .unwrap_or_else(|| DEFAULT_BIND.parse().expect("default bind address parses"));

    let store = build_store(&cli, &config).await?;
    let state = api::AppState::new(store);
    let router_config = api::RouterConfig {
        rate_limit: cli.rate_limit.or(server.rate_limit),
        body_limit: server.body_limit.unwrap_or(api::DEFAULT_BODY_LIMIT),
    };
    let app = api::router(state, router_config);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %bind, "tether relay listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("tether relay stopped");
    Ok(())
}

/// Resolve the store backend from flags and config. `--memory` wins; the
/// file backend is the default so a relay restart does not orphan the fleet.
async fn build_store(cli: &Cli, config: &Config) -> anyhow::Result<Store> {
    let store_config = config.store.clone().unwrap_or_default();
    let backend = if cli.memory {
        StoreBackend::Memory
    } else {
        store_config.backend.unwrap_or(StoreBackend::File)
    };

    match backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store");
            Ok(Store::new(Arc::new(MemoryStore::new())))
        }
        StoreBackend::File => {
            let dir = cli
                .data_dir
                .clone()
                .or(store_config.path)
                .unwrap_or_else(default_data_dir);
            let file_store = FileStore::open(&dir).await?;
            tracing::info!(path = %file_store.root().display(), "using file store");
            Ok(Store::new(Arc::new(file_store)))
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
        .join("config.toml")
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tether=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received Ctrl+C, shutting down");
}

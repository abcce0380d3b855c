use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use visit_counter::config::{StoreBackend, VisitsConfig};
use visit_counter::http::{HttpServer, PageSource};
use visit_counter::store::{spawn_eviction, KeyValueStore, MemoryStore, RedisStore};
use visit_counter::visits::VisitCounter;

/// How often the in-memory store sweeps expired keys.
const EVICTION_INTERVAL: Duration = Duration::from_secs(10);

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "visit-counter")]
#[command(about = "Counts visits per client IP in a one-minute window")]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store endpoint (host:port), overrides the configuration
    #[arg(long)]
    store_endpoint: Option<String>,

    /// Address to listen on, overrides the configuration
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Visit Counter");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = VisitsConfig::load(args.config.as_deref())?;
    if let Some(endpoint) = args.store_endpoint {
        config.store.endpoint = endpoint;
    }
    if let Some(listen) = args.listen {
        config.server.http_addr = listen;
    }
    info!(
        http_addr = %config.server.http_addr,
        route = %config.server.route,
        backend = ?config.store.backend,
        "Configuration loaded"
    );

    // The store must be reachable before we accept traffic
    let store: Arc<dyn KeyValueStore> = match config.store.backend {
        StoreBackend::Redis => Arc::new(RedisStore::connect(&config.store).await?),
        StoreBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            spawn_eviction(store.clone(), EVICTION_INTERVAL);
            info!("Using in-memory store");
            store
        }
    };

    let page = PageSource::from_config(&config.page)?;
    let counter = VisitCounter::new(store);

    let server = HttpServer::new(config.server.http_addr, config.server.route, counter, page);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Visit Counter stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

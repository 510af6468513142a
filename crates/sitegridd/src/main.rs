//! sitegridd — the SiteGrid daemon.
//!
//! Single binary that assembles the grid control plane:
//! - Object store (redb)
//! - Grid controller (reconcile workers + work queue)
//! - REST API
//!
//! # Usage
//!
//! ```text
//! sitegridd standalone --port 8470 --data-dir /var/lib/sitegrid
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use sitegrid_core::SiteGridConfig;

#[derive(Parser)]
#[command(name = "sitegridd", about = "SiteGrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run in standalone mode (store, controller, and API in one process).
    Standalone {
        /// Port to listen on.
        #[arg(long, default_value = "8470")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/sitegrid")]
        data_dir: PathBuf,

        /// Optional sitegrid.toml with controller tunables.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the number of reconcile workers.
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sitegridd=debug,sitegrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            port,
            data_dir,
            config,
            workers,
        } => run_standalone(port, data_dir, config, workers).await,
    }
}

async fn run_standalone(
    port: u16,
    data_dir: PathBuf,
    config: Option<PathBuf>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    info!("SiteGrid daemon starting in standalone mode");

    let mut tuning = match config {
        Some(path) => SiteGridConfig::from_file(&path)?.controller,
        None => SiteGridConfig::default().controller,
    };
    if let Some(workers) = workers {
        tuning.workers = workers;
    }

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("sitegrid.redb");

    // ── Initialize subsystems ──────────────────────────────────

    // Object store.
    let store = sitegrid_store::GridStore::open(&db_path)?;
    info!(path = ?db_path, "object store opened");

    // Grid controller.
    let controller =
        sitegrid_controller::Controller::new(Arc::new(store.clone()), tuning.clone());
    let events = store.subscribe();
    info!(workers = tuning.workers, "grid controller initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let controller_handle = tokio::spawn(async move {
        controller.run(events, shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = sitegrid_api::build_router(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the controller to drain.
    let _ = controller_handle.await;

    info!("SiteGrid daemon stopped");
    Ok(())
}

//! pitchside-ingest - Match Result Reconciliation Service
//!
//! Pulls crawler-produced match messages off the inbound queue and
//! reconciles them against the authoritative match store, protecting
//! manually-scored results behind lock semantics and surfacing
//! disagreements for admin resolution.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pitchside_ingest::config::IngestSettings;
use pitchside_ingest::{build_router, worker, AppState};

/// Command-line arguments for pitchside-ingest
#[derive(Parser, Debug)]
#[command(name = "pitchside-ingest")]
#[command(about = "Match result reconciliation service for Pitchside")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PITCHSIDE_PORT")]
    port: Option<u16>,

    /// Path to the SQLite database
    #[arg(short, long, env = "PITCHSIDE_DATABASE")]
    database: Option<PathBuf>,

    /// Number of queue worker tasks
    #[arg(short, long, env = "PITCHSIDE_WORKERS")]
    workers: Option<usize>,

    /// Path to the TOML config file
    #[arg(short, long, env = "PITCHSIDE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitchside_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let toml_config = pitchside_common::config::load_toml_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    let settings = Arc::new(IngestSettings::resolve(
        args.database,
        args.port,
        args.workers,
        &toml_config,
    ));

    info!("Starting pitchside-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", settings.database_path.display());
    info!("Workers: {}", settings.workers);

    let db = pitchside_common::db::init_database(&settings.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    // Worker pool pulls from the inbound queue until shutdown
    let cancel = CancellationToken::new();
    let worker_handles = worker::spawn_workers(db.clone(), Arc::clone(&settings), cancel.clone());

    let state = AppState::new(db);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", settings.port))
        .await
        .with_context(|| format!("Failed to bind port {}", settings.port))?;
    info!("Listening on http://127.0.0.1:{}", settings.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight units of work finish before exiting
    info!("Shutting down, stopping workers");
    cancel.cancel();
    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Received shutdown signal");
}

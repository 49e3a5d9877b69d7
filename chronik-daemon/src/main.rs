//! Chronik daemon - temporal-event ingestion and analytics server.
//!
//! A single Rust binary that provides:
//! - Background ingestion of flat-file event records with durable job
//!   progress tracking
//! - HTTP API for event lookup, timelines, interval analytics, and
//!   shortest-path queries

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use chronik_daemon::server::{create_router, AppState};
use chronik_daemon::storage::Eventbase;

/// Chronik temporal-event daemon
#[derive(Parser, Debug)]
#[command(name = "chronik-daemon")]
#[command(about = "Temporal-event ingestion and analytics daemon")]
#[command(version)]
struct Cli {
    /// Path to the .eventbase database file
    #[arg(long, default_value = ".eventbase")]
    database: PathBuf,

    /// HTTP port to listen on
    #[arg(short, long, default_value = "9130")]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    info!("Starting chronik daemon");
    info!("Database: {:?}", cli.database);

    let store = Eventbase::open(&cli.database)?;
    let stats = store.stats()?;
    info!(
        "Database opened: {} events, {} jobs",
        stats.event_count, stats.job_count
    );

    let state = AppState::new(Arc::new(store));

    // Log ingestion progress events as jobs run in the background.
    let mut events_rx = state.subscribe();
    tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(event) => debug!("Ingest event: {:?}", event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Ingest event log lagged, skipped {}", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let router = create_router(state);
    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Chronik daemon listening on http://{}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

//! Chronik CLI - command-line client for the chronik daemon.
//!
//! Submits flat-file ingestion jobs, polls their progress, and runs
//! temporal-structure queries (timelines, overlaps, gaps, influence paths)
//! against a running daemon.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod client;
mod commands;
mod output;

use client::ApiClient;
use output::OutputFormat;

/// Temporal-event analytics for flat-file archives.
///
/// Chronik ingests pipe-delimited historical event records in the
/// background and answers structure queries over the result: hierarchy
/// timelines, overlap detection, gap finding, and minimum-duration
/// influence paths.
#[derive(Parser)]
#[command(name = "chronik")]
#[command(author, version)]
#[command(about = "Temporal-event analytics for flat-file archives")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon base URL
    #[arg(
        long,
        global = true,
        env = "CHRONIK_SERVER",
        default_value = "http://127.0.0.1:9130"
    )]
    server: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a file for background ingestion
    Ingest {
        /// Path to the pipe-delimited event file
        file: String,
    },

    /// Show the progress and outcome of an ingestion job
    Status {
        job_id: Uuid,
    },

    /// Search ingested events
    Events {
        /// Substring match on the event name
        #[arg(long)]
        name: Option<String>,

        /// Only events starting at or after this timestamp
        #[arg(long)]
        from: Option<String>,

        /// Only events ending at or before this timestamp
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Number of results to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Print the timeline tree rooted at an event
    Timeline {
        event_id: Uuid,
    },

    /// List overlapping event pairs, longest overlap first
    Overlaps,

    /// Find the largest gap between events inside a window
    Gap {
        /// Window start timestamp
        start: String,
        /// Window end timestamp
        end: String,
    },

    /// Minimum-total-duration influence path between two events
    Path {
        source: Uuid,
        target: Uuid,
    },

    /// Check daemon health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let client = ApiClient::new(&cli.server);
    let format = cli.format;

    match cli.command {
        Commands::Ingest { file } => commands::ingest::run_ingest(&client, &file, format).await,
        Commands::Status { job_id } => commands::ingest::run_status(&client, job_id, format).await,
        Commands::Events {
            name,
            from,
            to,
            limit,
            offset,
        } => commands::query::run_events(&client, name, from, to, limit, offset, format).await,
        Commands::Timeline { event_id } => {
            commands::query::run_timeline(&client, event_id, format).await
        }
        Commands::Overlaps => commands::analyze::run_overlaps(&client, format).await,
        Commands::Gap { start, end } => {
            commands::analyze::run_gap(&client, &start, &end, format).await
        }
        Commands::Path { source, target } => {
            commands::analyze::run_path(&client, source, target, format).await
        }
        Commands::Health => commands::query::run_health(&client).await,
    }
}

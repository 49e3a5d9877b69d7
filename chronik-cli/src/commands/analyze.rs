//! Analytics commands - overlaps, gaps, influence paths.

use anyhow::Result;
use colored::Colorize;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn run_overlaps(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let pairs = client.overlaps().await?;

    match format {
        OutputFormat::Json => output::print_json(&pairs)?,
        OutputFormat::Table => println!("{}", output::overlap_table(&pairs)),
    }
    Ok(())
}

pub async fn run_gap(
    client: &ApiClient,
    start: &str,
    end: &str,
    format: OutputFormat,
) -> Result<()> {
    let reply = client.gap(start, end).await?;

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "found": reply.found,
            "gap": reply.gap,
        }))?,
        OutputFormat::Table => match reply.gap {
            Some(gap) => println!("{}", output::gap_summary(&gap)),
            None => println!("{}", "No gap found in the window".yellow()),
        },
    }
    Ok(())
}

pub async fn run_path(
    client: &ApiClient,
    source: Uuid,
    target: Uuid,
    format: OutputFormat,
) -> Result<()> {
    let reply = client.path(source, target).await?;

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "found": reply.found,
            "path": reply.path,
            "total_minutes": reply.total_minutes,
        }))?,
        OutputFormat::Table => {
            if reply.found {
                let total = reply.total_minutes.unwrap_or(0);
                println!("{}", output::path_summary(&reply.path, total));
            } else {
                println!("{}", "No path between the two events".yellow());
            }
        }
    }
    Ok(())
}

//! Event query commands - search, timelines, health.

use anyhow::Result;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn run_events(
    client: &ApiClient,
    name: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<usize>,
    offset: usize,
    format: OutputFormat,
) -> Result<()> {
    let events = client.events(name, from, to, limit, offset).await?;

    match format {
        OutputFormat::Json => output::print_json(&events)?,
        OutputFormat::Table => println!("{}", output::event_table(&events)),
    }
    Ok(())
}

pub async fn run_timeline(client: &ApiClient, root_id: Uuid, format: OutputFormat) -> Result<()> {
    let tree = client.timeline(root_id).await?;

    match format {
        OutputFormat::Json => output::print_json(&tree)?,
        OutputFormat::Table => print!("{}", output::timeline_tree(&tree)),
    }
    Ok(())
}

pub async fn run_health(client: &ApiClient) -> Result<()> {
    let health = client.health().await?;
    output::print_json(&health)
}

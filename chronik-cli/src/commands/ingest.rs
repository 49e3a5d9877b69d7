//! Ingestion commands - submit a file and poll job progress.

use anyhow::{Context, Result};
use colored::Colorize;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn run_ingest(client: &ApiClient, file: &str, format: OutputFormat) -> Result<()> {
    // The daemon resolves relative paths against its own working directory,
    // so send an absolute path.
    let absolute = std::fs::canonicalize(file).with_context(|| format!("cannot read {}", file))?;
    let reply = client
        .ingest(absolute.to_str().unwrap_or(file))
        .await?;

    match format {
        OutputFormat::Json => {
            output::print_json(&serde_json::json!({ "job_id": reply.job_id }))?
        }
        OutputFormat::Table => {
            println!("{} job {}", "Started".green().bold(), reply.job_id);
            println!("Poll with: chronik status {}", reply.job_id);
        }
    }
    Ok(())
}

pub async fn run_status(client: &ApiClient, job_id: Uuid, format: OutputFormat) -> Result<()> {
    let job = client.job(job_id).await?;

    match format {
        OutputFormat::Json => output::print_json(&job)?,
        OutputFormat::Table => println!("{}", output::job_summary(&job)),
    }
    Ok(())
}

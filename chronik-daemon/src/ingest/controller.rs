//! Ingestion controller: drives one background task per import job.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use chronik_core::{parse_line, Event};

use crate::storage::{EventStore, JobError, JobLedger, JobSnapshot, StoreError};

use super::job::{JobState, JobUpdate};
use super::IngestEvent;

/// Batch size for atomic event-store commits.
pub const BATCH_SIZE: usize = 100;

/// Counter-flush cadence, in lines.
const FLUSH_INTERVAL: u64 = 100;

/// Errors surfaced by the synchronous part of `start_ingestion`.
///
/// Failures inside the background task use a different channel: they land
/// in the job ledger as a Failed status plus an appended error.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The path is not a readable file; no job was created.
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// The ledger rejected the initial job record; no task was spawned.
    #[error(transparent)]
    Ledger(#[from] StoreError),
}

/// Orchestrates ingestion jobs over the injected store and ledger.
#[derive(Clone)]
pub struct IngestionController {
    store: Arc<dyn EventStore>,
    ledger: Arc<dyn JobLedger>,
    events_tx: broadcast::Sender<IngestEvent>,
}

impl IngestionController {
    pub fn new(
        store: Arc<dyn EventStore>,
        ledger: Arc<dyn JobLedger>,
        events_tx: broadcast::Sender<IngestEvent>,
    ) -> Self {
        Self {
            store,
            ledger,
            events_tx,
        }
    }

    /// Start an ingestion job for `file_path`.
    ///
    /// Validates that the path is a readable file, synchronously records a
    /// Processing ledger entry, spawns the background task, and returns the
    /// job id before processing completes.
    pub async fn start_ingestion(&self, file_path: &str) -> Result<Uuid, IngestError> {
        // Opening (not just stat'ing) catches permission errors up front.
        let metadata =
            tokio::fs::metadata(file_path)
                .await
                .map_err(|e| IngestError::Unreadable {
                    path: file_path.to_string(),
                    reason: e.to_string(),
                })?;
        if !metadata.is_file() {
            return Err(IngestError::Unreadable {
                path: file_path.to_string(),
                reason: "not a regular file".to_string(),
            });
        }
        File::open(file_path)
            .await
            .map_err(|e| IngestError::Unreadable {
                path: file_path.to_string(),
                reason: e.to_string(),
            })?;

        let state = JobState::new(file_path);
        let job_id = state.job_id();
        self.ledger.create_job(state.snapshot())?;

        info!("Starting ingestion job {} for {}", job_id, file_path);
        self.broadcast(IngestEvent::JobStarted { job_id });

        let controller = self.clone();
        tokio::spawn(async move {
            controller.drive_job(state).await;
        });

        Ok(job_id)
    }

    /// Current ledger snapshot for a job, or `None` if the id is unknown.
    pub fn get_job_status(&self, job_id: Uuid) -> Result<Option<JobSnapshot>, StoreError> {
        self.ledger.get(job_id)
    }

    /// Background task body plus its error channel: any failure in
    /// `run_job` is routed into the ledger as a Failed terminal state, so a
    /// deep processing error is never silently dropped.
    async fn drive_job(&self, mut state: JobState) {
        let job_id = state.job_id();

        match self.run_job(&mut state).await {
            Ok(()) => {
                let snap = state.snapshot();
                info!(
                    "Job {} completed: {}/{} lines processed, {} errors",
                    job_id, snap.processed_lines, snap.total_lines, snap.error_lines
                );
                self.broadcast(IngestEvent::JobCompleted {
                    job_id,
                    processed: snap.processed_lines,
                    errors: snap.error_lines,
                });
            }
            Err(err) => {
                error!("Ingestion job {} failed: {:#}", job_id, err);
                let message = format!("{:#}", err);
                if state
                    .apply(JobUpdate::Fail {
                        message: message.clone(),
                        at: Utc::now(),
                    })
                    .is_ok()
                {
                    let ledger_error = JobError {
                        line_number: None,
                        message,
                    };
                    if let Err(e) = self.ledger.append_error(job_id, &ledger_error) {
                        error!("Job {}: failed to append fatal error: {}", job_id, e);
                    }
                    if let Err(e) = self.ledger.update(state.snapshot()) {
                        error!("Job {}: failed to record failure: {}", job_id, e);
                    }
                }
                self.broadcast(IngestEvent::JobFailed { job_id });
            }
        }
    }

    /// The job sequence: pre-count, stream, parse, batch, commit, finalize.
    ///
    /// Per-line parse failures are recorded and never abort the job; only
    /// I/O and ledger failures propagate (and fail the whole job).
    async fn run_job(&self, state: &mut JobState) -> Result<()> {
        let job_id = state.job_id();
        let file_path = state.snapshot().file_path.clone();

        // 1. Pre-count total lines for progress reporting.
        let total = count_lines(&file_path)
            .await
            .with_context(|| format!("pre-count failed for {}", file_path))?;
        state.apply(JobUpdate::TotalLines(total))?;
        self.ledger.update(state.snapshot())?;
        debug!("Job {}: {} lines in {}", job_id, total, file_path);

        // 2. Stream the file line by line.
        let file = File::open(&file_path)
            .await
            .with_context(|| format!("failed to open {}", file_path))?;
        let mut lines = BufReader::new(file).lines();

        let mut batch: Vec<Event> = Vec::with_capacity(BATCH_SIZE);
        let mut line_number: u64 = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("stream read failed at line {}", line_number + 1))?
        {
            line_number += 1;

            match parse_line(&line, line_number, &file_path) {
                // Blank line: neither a success nor an error.
                Ok(None) => {}
                Ok(Some(event)) => {
                    state.apply(JobUpdate::LineParsed)?;
                    batch.push(event);
                    if batch.len() >= BATCH_SIZE {
                        self.commit_batch(state, &mut batch)?;
                    }
                }
                Err(parse_error) => {
                    debug!("Job {}: line {}: {}", job_id, line_number, parse_error);
                    let message = parse_error.to_string();
                    state.apply(JobUpdate::LineFailed {
                        line_number,
                        message: message.clone(),
                    })?;
                    self.ledger.append_error(
                        job_id,
                        &JobError {
                            line_number: Some(line_number),
                            message,
                        },
                    )?;
                }
            }

            // 3. Periodic counter flush to the ledger.
            if line_number % FLUSH_INTERVAL == 0 {
                self.ledger.update(state.snapshot())?;
            }
        }

        // 4. Trailing partial batch, same atomic-commit rule.
        self.commit_batch(state, &mut batch)?;

        state.apply(JobUpdate::Complete { at: Utc::now() })?;
        self.ledger.update(state.snapshot())?;
        Ok(())
    }

    /// Commit the accumulated batch as one atomic group.
    ///
    /// On rejection the whole batch is reclassified processed → error and
    /// discarded (not retried); the job continues with the next batch.
    fn commit_batch(&self, state: &mut JobState, batch: &mut Vec<Event>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len() as u64;

        match self.store.bulk_create(batch) {
            Ok(committed) => {
                debug!("Job {}: committed batch of {}", state.job_id(), committed);
                self.broadcast(IngestEvent::BatchCommitted {
                    job_id: state.job_id(),
                    count,
                });
            }
            Err(commit_error) => {
                let message = format!("batch commit failed ({} events): {}", count, commit_error);
                warn!("Job {}: {}", state.job_id(), message);
                state.apply(JobUpdate::BatchRejected {
                    count,
                    message: message.clone(),
                })?;
                self.ledger.append_error(
                    state.job_id(),
                    &JobError {
                        line_number: None,
                        message,
                    },
                )?;
            }
        }

        batch.clear();
        Ok(())
    }

    fn broadcast(&self, event: IngestEvent) {
        let _ = self.events_tx.send(event);
    }
}

/// Count lines without materializing the file.
async fn count_lines(path: &str) -> std::io::Result<u64> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut count = 0;
    while lines.next_line().await?.is_some() {
        count += 1;
    }
    Ok(count)
}

//! Job ledger record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::JobStatus;

/// One entry of a job's append-only error ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// 1-based source line, or `None` for batch/fatal errors not tied to a
    /// single line.
    pub line_number: Option<u64>,
    pub message: String,
}

/// Durable snapshot of one ingestion job.
///
/// Created when ingestion starts, mutated only by the controller driving
/// the job, immutable once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub file_path: String,
    /// Set once, after the pre-count pass.
    pub total_lines: u64,
    /// Monotonically increasing except for batch reclassification.
    pub processed_lines: u64,
    /// Monotonically increasing.
    pub error_lines: u64,
    /// Append-only, in occurrence order.
    pub errors: Vec<JobError>,
    pub start_time: DateTime<Utc>,
    /// Set once, on the terminal transition.
    pub end_time: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// Create a fresh Processing snapshot with a generated job id.
    pub fn new(file_path: &str) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Processing,
            file_path: file_path.to_string(),
            total_lines: 0,
            processed_lines: 0,
            error_lines: 0,
            errors: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }
}

//! Database schema definitions for chronik.
//!
//! Defines the job status enum and the DuckDB schema.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of an ingestion job.
///
/// The only legal transitions are `Processing → Completed` and
/// `Processing → Failed`; both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Background task is running
    Processing,
    /// Stream exhausted, final batch committed
    Completed,
    /// Fatal error aborted the job
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether the status is final (no further transitions are legal).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SQL schema for creating the chronik database tables.
///
/// Dates are stored as RFC 3339 text. There is no duration column: duration
/// is derived from the dates, never stored independently of them.
pub const SCHEMA_SQL: &str = r#"
-- Events table: ingested historical events
CREATE TABLE IF NOT EXISTS events (
    event_id VARCHAR PRIMARY KEY,
    event_name VARCHAR NOT NULL,
    description VARCHAR,
    start_date VARCHAR NOT NULL,
    end_date VARCHAR NOT NULL,
    parent_event_id VARCHAR,
    metadata JSON
);

-- Jobs table: one row per ingestion run
CREATE TABLE IF NOT EXISTS jobs (
    job_id VARCHAR PRIMARY KEY,
    status VARCHAR NOT NULL,
    file_path VARCHAR NOT NULL,
    total_lines BIGINT NOT NULL DEFAULT 0,
    processed_lines BIGINT NOT NULL DEFAULT 0,
    error_lines BIGINT NOT NULL DEFAULT 0,
    start_time VARCHAR NOT NULL,
    end_time VARCHAR
);

-- Job errors: append-only per-line error ledger
CREATE TABLE IF NOT EXISTS job_errors (
    job_id VARCHAR NOT NULL,
    seq BIGINT NOT NULL,
    line_number BIGINT,
    message VARCHAR NOT NULL
);

-- Metadata table: version info
CREATE TABLE IF NOT EXISTS metadata (
    key VARCHAR PRIMARY KEY,
    value VARCHAR
);

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_events_parent ON events(parent_event_id);
CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_date);
CREATE INDEX IF NOT EXISTS idx_events_name ON events(event_name);
CREATE INDEX IF NOT EXISTS idx_job_errors_job ON job_errors(job_id);
"#;

/// Schema version for migrations
pub const SCHEMA_VERSION: &str = "1.0.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_roundtrip() {
        for status in [JobStatus::Processing, JobStatus::Completed, JobStatus::Failed] {
            let s = status.as_str();
            let parsed = JobStatus::parse(s);
            assert_eq!(parsed, Some(status));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}

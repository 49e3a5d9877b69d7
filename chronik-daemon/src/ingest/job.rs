//! Ingestion job state machine.
//!
//! The job's mutable counters and error list live in a typed state object
//! with a closed command set. Only `Processing → {Completed, Failed}`
//! transitions are legal, and no mutation may follow a terminal transition.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::{JobError, JobSnapshot, JobStatus};

/// Typed commands accepted by [`JobState::apply`].
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// Set the pre-counted total line count.
    TotalLines(u64),
    /// One line parsed successfully and joined the current batch.
    LineParsed,
    /// One line failed to parse; recorded, never fatal.
    LineFailed {
        line_number: u64,
        message: String,
    },
    /// A batch commit was rejected: every record in it is reclassified from
    /// processed to error, and the batch is discarded.
    BatchRejected {
        count: u64,
        message: String,
    },
    /// Terminal: stream exhausted and the trailing batch handled.
    Complete {
        at: DateTime<Utc>,
    },
    /// Terminal: a fatal error aborted the job.
    Fail {
        message: String,
        at: DateTime<Utc>,
    },
}

/// Rejected transition on a terminal job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id} is terminal ({status}); no further transitions are legal")]
pub struct TransitionError {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// In-memory authoritative state of one running job.
///
/// The controller applies typed updates here and flushes the snapshot to
/// the durable ledger; the ledger never sees an ad hoc partial patch.
#[derive(Debug, Clone)]
pub struct JobState {
    snapshot: JobSnapshot,
}

impl JobState {
    pub fn new(file_path: &str) -> Self {
        Self {
            snapshot: JobSnapshot::new(file_path),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.snapshot.job_id
    }

    pub fn snapshot(&self) -> &JobSnapshot {
        &self.snapshot
    }

    /// Apply one typed update.
    ///
    /// Fails on a terminal job; terminal transitions set `end_time` exactly
    /// once.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), TransitionError> {
        if self.snapshot.status.is_terminal() {
            return Err(TransitionError {
                job_id: self.snapshot.job_id,
                status: self.snapshot.status,
            });
        }

        match update {
            JobUpdate::TotalLines(total) => {
                self.snapshot.total_lines = total;
            }
            JobUpdate::LineParsed => {
                self.snapshot.processed_lines += 1;
            }
            JobUpdate::LineFailed {
                line_number,
                message,
            } => {
                self.snapshot.error_lines += 1;
                self.snapshot.errors.push(JobError {
                    line_number: Some(line_number),
                    message,
                });
            }
            JobUpdate::BatchRejected { count, message } => {
                self.snapshot.processed_lines =
                    self.snapshot.processed_lines.saturating_sub(count);
                self.snapshot.error_lines += count;
                self.snapshot.errors.push(JobError {
                    line_number: None,
                    message,
                });
            }
            JobUpdate::Complete { at } => {
                self.snapshot.status = JobStatus::Completed;
                self.snapshot.end_time = Some(at);
            }
            JobUpdate::Fail { message, at } => {
                self.snapshot.status = JobStatus::Failed;
                self.snapshot.end_time = Some(at);
                self.snapshot.errors.push(JobError {
                    line_number: None,
                    message,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_updates() {
        let mut state = JobState::new("/data/events.txt");
        state.apply(JobUpdate::TotalLines(10)).unwrap();
        state.apply(JobUpdate::LineParsed).unwrap();
        state.apply(JobUpdate::LineParsed).unwrap();
        state
            .apply(JobUpdate::LineFailed {
                line_number: 3,
                message: "bad uuid".to_string(),
            })
            .unwrap();

        let snap = state.snapshot();
        assert_eq!(snap.total_lines, 10);
        assert_eq!(snap.processed_lines, 2);
        assert_eq!(snap.error_lines, 1);
        assert_eq!(snap.errors.len(), 1);
        assert_eq!(snap.errors[0].line_number, Some(3));
    }

    #[test]
    fn test_batch_rejection_reclassifies() {
        let mut state = JobState::new("/data/events.txt");
        for _ in 0..5 {
            state.apply(JobUpdate::LineParsed).unwrap();
        }
        state
            .apply(JobUpdate::BatchRejected {
                count: 5,
                message: "dangling parent".to_string(),
            })
            .unwrap();

        let snap = state.snapshot();
        assert_eq!(snap.processed_lines, 0);
        assert_eq!(snap.error_lines, 5);
        assert_eq!(snap.errors.len(), 1);
        assert_eq!(snap.errors[0].line_number, None);
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut state = JobState::new("/data/events.txt");
        let at = Utc::now();
        state.apply(JobUpdate::Complete { at }).unwrap();
        assert_eq!(state.snapshot().status, JobStatus::Completed);
        assert_eq!(state.snapshot().end_time, Some(at));

        let err = state.apply(JobUpdate::LineParsed).unwrap_err();
        assert_eq!(err.status, JobStatus::Completed);
        // end_time was set exactly once
        assert_eq!(state.snapshot().end_time, Some(at));
    }

    #[test]
    fn test_fail_records_message() {
        let mut state = JobState::new("/data/events.txt");
        state
            .apply(JobUpdate::Fail {
                message: "stream read failed".to_string(),
                at: Utc::now(),
            })
            .unwrap();

        assert_eq!(state.snapshot().status, JobStatus::Failed);
        assert_eq!(state.snapshot().errors[0].message, "stream read failed");
        assert!(state
            .apply(JobUpdate::Fail {
                message: "again".to_string(),
                at: Utc::now(),
            })
            .is_err());
    }
}

//! Ingestion pipeline.
//!
//! One background tokio task per job: pre-count, stream, parse, batch,
//! commit, finalize. Progress and errors are durably recorded in the job
//! ledger as the task runs; live progress is additionally announced on a
//! broadcast channel.

mod controller;
mod job;

pub use controller::{IngestError, IngestionController, BATCH_SIZE};
pub use job::{JobState, JobUpdate, TransitionError};

use uuid::Uuid;

/// Events broadcast as ingestion jobs progress.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    /// Job created and background task spawned
    JobStarted { job_id: Uuid },
    /// A batch was durably committed
    BatchCommitted { job_id: Uuid, count: u64 },
    /// Job reached Completed
    JobCompleted {
        job_id: Uuid,
        processed: u64,
        errors: u64,
    },
    /// Job reached Failed
    JobFailed { job_id: Uuid },
}

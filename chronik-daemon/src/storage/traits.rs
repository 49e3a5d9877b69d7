//! Storage collaborator boundaries consumed by the ingestion pipeline.
//!
//! The controller only sees these traits; the DuckDB-backed [`Eventbase`]
//! implements both, and tests substitute in-memory doubles.
//!
//! [`Eventbase`]: super::Eventbase

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use chronik_core::Event;

use super::jobs::{JobError, JobSnapshot};

/// Storage-layer failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A write violated a storage constraint (duplicate event id, dangling
    /// parent reference).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Backend failure (connection, SQL, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for paginated event searches.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Case-insensitive substring match on the event name.
    pub name_contains: Option<String>,
    /// Only events starting at or after this instant.
    pub starts_after: Option<DateTime<Utc>>,
    /// Only events ending at or before this instant.
    pub ends_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Durable keyed storage for event records.
///
/// `bulk_create` is atomic per call: either every event in the batch is
/// durable afterwards, or none is. A parent reference must point at an
/// event that is already durable or earlier in the same batch.
pub trait EventStore: Send + Sync {
    fn create(&self, event: &Event) -> StoreResult<()>;

    /// Commit a batch as one atomic group. Returns the number committed.
    fn bulk_create(&self, events: &[Event]) -> StoreResult<usize>;

    fn find_by_id(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    /// All events transitively nested under `root`, the root excluded,
    /// ordered by start date.
    fn descendants(&self, root: Uuid) -> StoreResult<Vec<Event>>;

    /// Full scan for graph building and interval analytics.
    fn all_events(&self) -> StoreResult<Vec<Event>>;

    /// Filtered, paginated search ordered by start date.
    fn search(&self, filter: &EventFilter) -> StoreResult<Vec<Event>>;
}

/// Durable keyed storage for job progress and state.
pub trait JobLedger: Send + Sync {
    fn create_job(&self, job: &JobSnapshot) -> StoreResult<()>;

    fn get(&self, job_id: Uuid) -> StoreResult<Option<JobSnapshot>>;

    /// Persist counters, status, and end time. Scoped to one job id and
    /// atomic relative to other mutations of the same job.
    fn update(&self, job: &JobSnapshot) -> StoreResult<()>;

    /// Append to the job's ordered error ledger.
    fn append_error(&self, job_id: Uuid, error: &JobError) -> StoreResult<()>;
}

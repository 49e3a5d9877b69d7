//! Storage layer for the chronik daemon.
//!
//! Provides DuckDB-based durable storage with:
//! - Schema management
//! - Event store (atomic batch commits, parent-reference enforcement)
//! - Job ledger (progress counters, append-only error log)
//! - Injectable trait boundaries so the pipeline can be tested without a
//!   real database

mod eventbase;
mod jobs;
mod schema;
mod traits;

pub use eventbase::{AccessMode, Eventbase, StoreStats};
pub use jobs::{JobError, JobSnapshot};
pub use schema::{JobStatus, SCHEMA_SQL, SCHEMA_VERSION};
pub use traits::{EventFilter, EventStore, JobLedger, StoreError, StoreResult};

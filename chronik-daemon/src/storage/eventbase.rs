//! Eventbase - DuckDB-based durable storage for events and ingestion jobs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use duckdb::{params, Config, Connection};
use uuid::Uuid;

use chronik_core::{Event, EventMetadata};

use super::jobs::{JobError, JobSnapshot};
use super::schema::{JobStatus, SCHEMA_SQL, SCHEMA_VERSION};
use super::traits::{EventFilter, EventStore, JobLedger, StoreError, StoreResult};

/// Database access mode for concurrent access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-write mode (exclusive lock, for the daemon)
    #[default]
    ReadWrite,
    /// Read-only mode (shared access, for queries)
    ReadOnly,
}

const EVENT_COLUMNS: &str =
    "event_id, event_name, description, start_date, end_date, parent_event_id, metadata";

/// Eventbase - DuckDB-based storage implementing [`EventStore`] and
/// [`JobLedger`].
///
/// DuckDB's concurrency model is single writer, multiple readers; the
/// daemon holds one read-write connection behind a mutex, and ledger/store
/// mutations commit statement-at-a-time under that lock, which gives the
/// per-job atomicity the ingestion pipeline relies on.
pub struct Eventbase {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Eventbase {
    /// Open or create an Eventbase database in read-write mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mode(path, AccessMode::ReadWrite)
    }

    /// Open an Eventbase database in read-only mode (for concurrent queries).
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mode(path, AccessMode::ReadOnly)
    }

    /// Open an Eventbase database with the specified access mode.
    pub fn open_with_mode(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref();

        let conn = match mode {
            AccessMode::ReadWrite => Connection::open(path)
                .with_context(|| format!("Failed to open database: {:?}", path))?,
            AccessMode::ReadOnly => {
                let config = Config::default()
                    .access_mode(duckdb::AccessMode::ReadOnly)
                    .map_err(|e| anyhow::anyhow!("Failed to set read-only mode: {}", e))?;
                Connection::open_with_flags(path, config).with_context(|| {
                    format!("Failed to open database in read-only mode: {:?}", path)
                })?
            }
        };

        let base = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        };

        // Only initialize schema in read-write mode
        if mode == AccessMode::ReadWrite {
            base.init_schema()?;
        }

        Ok(base)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the database connection lock, handling PoisonError gracefully.
    /// If the mutex is poisoned (previous holder panicked), we still acquire
    /// the lock and continue - the database connection itself is likely fine.
    fn acquire_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Recovering from poisoned database mutex");
                poisoned.into_inner()
            }
        }
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.acquire_conn();

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")?;

        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)",
            params![SCHEMA_VERSION],
        )
        .context("Failed to set schema version")?;

        Ok(())
    }

    /// Insert one event while holding the connection lock.
    ///
    /// Enforces the two commit-time constraints: unique event id, and a
    /// parent that is already durable (earlier rows of an open transaction
    /// included).
    fn insert_event_locked(&self, conn: &Connection, event: &Event) -> StoreResult<()> {
        let id = event.event_id.to_string();

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM events WHERE event_id = ?",
                params![id],
                |row| row.get(0),
            )
            .map_err(backend)?;
        if exists {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate event id {}",
                id
            )));
        }

        if let Some(parent_id) = event.parent_event_id {
            let parent_exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM events WHERE event_id = ?",
                    params![parent_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(backend)?;
            if !parent_exists {
                return Err(StoreError::ConstraintViolation(format!(
                    "event {} references unknown parent {}",
                    id, parent_id
                )));
            }
        }

        let metadata_json =
            serde_json::to_string(&event.metadata).map_err(|e| StoreError::Backend(e.to_string()))?;

        conn.execute(
            r#"INSERT INTO events
               (event_id, event_name, description, start_date, end_date, parent_event_id, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                id,
                event.event_name,
                event.description,
                event.start_date.to_rfc3339(),
                event.end_date.to_rfc3339(),
                event.parent_event_id.map(|p| p.to_string()),
                metadata_json,
            ],
        )
        .map_err(backend)?;

        Ok(())
    }

    fn query_events(&self, sql: &str, sql_params: &[&dyn duckdb::ToSql]) -> StoreResult<Vec<Event>> {
        let conn = self.acquire_conn();
        let mut stmt = conn.prepare(sql).map_err(backend)?;
        let mut rows = stmt.query(sql_params).map_err(backend)?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(backend)? {
            let raw: RawEventRow = (
                row.get(0).map_err(backend)?,
                row.get(1).map_err(backend)?,
                row.get(2).map_err(backend)?,
                row.get(3).map_err(backend)?,
                row.get(4).map_err(backend)?,
                row.get(5).map_err(backend)?,
                row.get(6).map_err(backend)?,
            );
            events.push(to_event(raw)?);
        }
        Ok(events)
    }

    /// Get storage statistics.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.acquire_conn();

        let event_count: usize = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .map_err(backend)?;
        let job_count: usize = conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))
            .map_err(backend)?;

        let mut jobs_by_status = HashMap::new();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")
            .map_err(backend)?;
        let mut rows = stmt.query([]).map_err(backend)?;
        while let Some(row) = rows.next().map_err(backend)? {
            let status: String = row.get(0).map_err(backend)?;
            let count: usize = row.get(1).map_err(backend)?;
            jobs_by_status.insert(status, count);
        }

        Ok(StoreStats {
            event_count,
            job_count,
            jobs_by_status,
        })
    }
}

impl EventStore for Eventbase {
    fn create(&self, event: &Event) -> StoreResult<()> {
        let conn = self.acquire_conn();
        self.insert_event_locked(&conn, event)
    }

    fn bulk_create(&self, events: &[Event]) -> StoreResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let conn = self.acquire_conn();
        conn.execute_batch("BEGIN TRANSACTION").map_err(backend)?;

        let result = events
            .iter()
            .try_for_each(|event| self.insert_event_locked(&conn, event));

        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT").map_err(backend)?;
                Ok(events.len())
            }
            Err(err) => {
                // All-or-nothing: a rejected batch writes nothing.
                let _ = conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }

    fn find_by_id(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE event_id = ?", EVENT_COLUMNS);
        let events = self.query_events(&sql, &[&event_id.to_string()])?;
        Ok(events.into_iter().next())
    }

    fn descendants(&self, root: Uuid) -> StoreResult<Vec<Event>> {
        let sql = format!(
            r#"WITH RECURSIVE subtree(event_id) AS (
                   SELECT event_id FROM events WHERE parent_event_id = ?
                   UNION ALL
                   SELECT e.event_id FROM events e
                   JOIN subtree s ON e.parent_event_id = s.event_id
               )
               SELECT {} FROM events
               WHERE event_id IN (SELECT event_id FROM subtree)
               ORDER BY start_date"#,
            EVENT_COLUMNS
        );
        self.query_events(&sql, &[&root.to_string()])
    }

    fn all_events(&self) -> StoreResult<Vec<Event>> {
        let sql = format!("SELECT {} FROM events ORDER BY start_date", EVENT_COLUMNS);
        self.query_events(&sql, &[])
    }

    fn search(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        // Every clause is guarded by its parameter so the statement shape is
        // static; RFC 3339 text in a single zone compares lexicographically.
        let sql = format!(
            r#"SELECT {} FROM events
               WHERE (? = '' OR lower(event_name) LIKE '%' || lower(?) || '%')
                 AND (? = '' OR start_date >= ?)
                 AND (? = '' OR end_date <= ?)
               ORDER BY start_date
               LIMIT ? OFFSET ?"#,
            EVENT_COLUMNS
        );

        let name = filter.name_contains.clone().unwrap_or_default();
        let from = filter
            .starts_after
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let to = filter
            .ends_before
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let limit = filter.limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let offset = filter.offset as i64;

        self.query_events(
            &sql,
            &[&name, &name, &from, &from, &to, &to, &limit, &offset],
        )
    }
}

impl JobLedger for Eventbase {
    fn create_job(&self, job: &JobSnapshot) -> StoreResult<()> {
        let conn = self.acquire_conn();
        conn.execute(
            r#"INSERT INTO jobs
               (job_id, status, file_path, total_lines, processed_lines, error_lines, start_time, end_time)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                job.job_id.to_string(),
                job.status.as_str(),
                job.file_path,
                job.total_lines as i64,
                job.processed_lines as i64,
                job.error_lines as i64,
                job.start_time.to_rfc3339(),
                job.end_time.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn get(&self, job_id: Uuid) -> StoreResult<Option<JobSnapshot>> {
        let conn = self.acquire_conn();

        let row = conn.query_row(
            r#"SELECT status, file_path, total_lines, processed_lines, error_lines, start_time, end_time
               FROM jobs WHERE job_id = ?"#,
            params![job_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        );

        let (status, file_path, total, processed, errors, start_time, end_time) = match row {
            Ok(values) => values,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(err) => return Err(backend(err)),
        };

        let mut job = JobSnapshot {
            job_id,
            status: JobStatus::parse(&status)
                .ok_or_else(|| StoreError::Backend(format!("unknown job status {:?}", status)))?,
            file_path,
            total_lines: total as u64,
            processed_lines: processed as u64,
            error_lines: errors as u64,
            errors: Vec::new(),
            start_time: parse_stored_timestamp(&start_time)?,
            end_time: end_time
                .map(|t| parse_stored_timestamp(&t))
                .transpose()?,
        };

        let mut stmt = conn
            .prepare("SELECT line_number, message FROM job_errors WHERE job_id = ? ORDER BY seq")
            .map_err(backend)?;
        let mut rows = stmt
            .query(params![job_id.to_string()])
            .map_err(backend)?;
        while let Some(row) = rows.next().map_err(backend)? {
            let line_number: Option<i64> = row.get(0).map_err(backend)?;
            let message: String = row.get(1).map_err(backend)?;
            job.errors.push(JobError {
                line_number: line_number.map(|n| n as u64),
                message,
            });
        }

        Ok(Some(job))
    }

    fn update(&self, job: &JobSnapshot) -> StoreResult<()> {
        let conn = self.acquire_conn();
        let updated = conn
            .execute(
                r#"UPDATE jobs
                   SET status = ?, total_lines = ?, processed_lines = ?, error_lines = ?, end_time = ?
                   WHERE job_id = ?"#,
                params![
                    job.status.as_str(),
                    job.total_lines as i64,
                    job.processed_lines as i64,
                    job.error_lines as i64,
                    job.end_time.map(|t| t.to_rfc3339()),
                    job.job_id.to_string(),
                ],
            )
            .map_err(backend)?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("job {}", job.job_id)));
        }
        Ok(())
    }

    fn append_error(&self, job_id: Uuid, error: &JobError) -> StoreResult<()> {
        let conn = self.acquire_conn();
        let next_seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM job_errors WHERE job_id = ?",
                params![job_id.to_string()],
                |row| row.get(0),
            )
            .map_err(backend)?;

        conn.execute(
            "INSERT INTO job_errors (job_id, seq, line_number, message) VALUES (?, ?, ?, ?)",
            params![
                job_id.to_string(),
                next_seq,
                error.line_number.map(|n| n as i64),
                error.message,
            ],
        )
        .map_err(backend)?;
        Ok(())
    }
}

/// Statistics about the stored data.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub event_count: usize,
    pub job_count: usize,
    pub jobs_by_status: HashMap<String, usize>,
}

type RawEventRow = (
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
);

fn to_event(raw: RawEventRow) -> StoreResult<Event> {
    let (id, name, description, start, end, parent, metadata) = raw;

    let event_id = Uuid::parse_str(&id)
        .map_err(|e| StoreError::Backend(format!("stored event id {:?}: {}", id, e)))?;
    let parent_event_id = parent
        .map(|p| {
            Uuid::parse_str(&p)
                .map_err(|e| StoreError::Backend(format!("stored parent id {:?}: {}", p, e)))
        })
        .transpose()?;
    let metadata = metadata
        .map(|m| {
            serde_json::from_str::<EventMetadata>(&m)
                .map_err(|e| StoreError::Backend(format!("stored metadata: {}", e)))
        })
        .transpose()?
        .unwrap_or_default();

    Ok(Event {
        event_id,
        event_name: name,
        description,
        start_date: parse_stored_timestamp(&start)?,
        end_date: parse_stored_timestamp(&end)?,
        parent_event_id,
        metadata,
    })
}

fn parse_stored_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("stored timestamp {:?}: {}", value, e)))
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

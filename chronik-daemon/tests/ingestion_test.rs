//! End-to-end ingestion pipeline tests.
//!
//! Runs real jobs against a tempdir DuckDB database, plus injected-failure
//! scenarios against in-memory store/ledger doubles.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

use chronik_core::Event;
use chronik_daemon::ingest::{IngestError, IngestionController, BATCH_SIZE};
use chronik_daemon::storage::{
    EventFilter, EventStore, Eventbase, JobError, JobLedger, JobSnapshot, JobStatus, StoreError,
    StoreResult,
};

// =============================================================================
// Helpers
// =============================================================================

fn valid_line(name: &str) -> String {
    format!(
        "{}|{}|2024-01-01T08:00:00|2024-01-01T09:00:00|NULL|",
        Uuid::new_v4(),
        name
    )
}

fn write_file(dir: &tempfile::TempDir, name: &str, lines: &[String]) -> String {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    path.to_str().unwrap().to_string()
}

fn open_test_db(dir: &tempfile::TempDir) -> Arc<Eventbase> {
    Arc::new(Eventbase::open(dir.path().join("test.eventbase")).unwrap())
}

fn controller_for(store: Arc<dyn EventStore>, ledger: Arc<dyn JobLedger>) -> IngestionController {
    let (events_tx, _) = broadcast::channel(1000);
    IngestionController::new(store, ledger, events_tx)
}

/// Poll until the job leaves Processing.
async fn wait_terminal(controller: &IngestionController, job_id: Uuid) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = controller
            .get_job_status(job_id)
            .unwrap()
            .expect("job should exist");
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never left processing", job_id);
}

// =============================================================================
// In-memory doubles
// =============================================================================

/// Event store double that fails selected bulk_create calls.
struct FlakyStore {
    events: Mutex<Vec<Event>>,
    bulk_calls: AtomicUsize,
    /// 1-based bulk_create call number to reject, 0 for never.
    fail_on_call: usize,
}

impl FlakyStore {
    fn reliable() -> Self {
        Self::failing_on(0)
    }

    fn failing_on(call: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            bulk_calls: AtomicUsize::new(0),
            fail_on_call: call,
        }
    }

    fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn bulk_call_count(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }
}

impl EventStore for FlakyStore {
    fn create(&self, event: &Event) -> StoreResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn bulk_create(&self, events: &[Event]) -> StoreResult<usize> {
        let call = self.bulk_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            return Err(StoreError::ConstraintViolation(
                "injected commit failure".to_string(),
            ));
        }
        self.events.lock().unwrap().extend_from_slice(events);
        Ok(events.len())
    }

    fn find_by_id(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned())
    }

    fn descendants(&self, _root: Uuid) -> StoreResult<Vec<Event>> {
        Ok(Vec::new())
    }

    fn all_events(&self) -> StoreResult<Vec<Event>> {
        Ok(self.events.lock().unwrap().clone())
    }

    fn search(&self, _filter: &EventFilter) -> StoreResult<Vec<Event>> {
        self.all_events()
    }
}

/// Job ledger double backed by a hash map.
#[derive(Default)]
struct MemLedger {
    jobs: Mutex<HashMap<Uuid, JobSnapshot>>,
}

impl MemLedger {
    fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl JobLedger for MemLedger {
    fn create_job(&self, job: &JobSnapshot) -> StoreResult<()> {
        self.jobs.lock().unwrap().insert(job.job_id, job.clone());
        Ok(())
    }

    fn get(&self, job_id: Uuid) -> StoreResult<Option<JobSnapshot>> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    fn update(&self, job: &JobSnapshot) -> StoreResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
            .get_mut(&job.job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {}", job.job_id)))?;
        // Counters, status, and end time only; the error list is append-only
        // via append_error.
        stored.status = job.status;
        stored.total_lines = job.total_lines;
        stored.processed_lines = job.processed_lines;
        stored.error_lines = job.error_lines;
        stored.end_time = job.end_time;
        Ok(())
    }

    fn append_error(&self, job_id: Uuid, error: &JobError) -> StoreResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {}", job_id)))?;
        stored.errors.push(error.clone());
        Ok(())
    }
}

// =============================================================================
// Scenarios against the real database
// =============================================================================

#[tokio::test]
async fn test_three_line_file_with_bad_uuid() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_test_db(&dir);
    let path = write_file(
        &dir,
        "events.txt",
        &[
            valid_line("first"),
            "not-a-uuid|second|2024-01-01T08:00:00|2024-01-01T09:00:00|NULL|".to_string(),
            valid_line("third"),
        ],
    );

    let controller = controller_for(store.clone(), store.clone());
    let job_id = controller.start_ingestion(&path).await.unwrap();
    let job = wait_terminal(&controller, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_lines, 3);
    assert_eq!(job.processed_lines, 2);
    assert_eq!(job.error_lines, 1);
    assert_eq!(job.errors.len(), 1);
    assert_eq!(job.errors[0].line_number, Some(2));
    assert!(job.errors[0].message.contains("UUID"));
    assert!(job.end_time.is_some());

    assert_eq!(store.all_events().unwrap().len(), 2);
}

#[tokio::test]
async fn test_blank_lines_neither_processed_nor_errored() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_test_db(&dir);
    let path = write_file(
        &dir,
        "events.txt",
        &[
            valid_line("first"),
            String::new(),
            "   ".to_string(),
            valid_line("second"),
        ],
    );

    let controller = controller_for(store.clone(), store.clone());
    let job_id = controller.start_ingestion(&path).await.unwrap();
    let job = wait_terminal(&controller, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_lines, 4);
    assert_eq!(job.processed_lines, 2);
    assert_eq!(job.error_lines, 0);
    assert!(job.processed_lines + job.error_lines <= job.total_lines);
}

#[tokio::test]
async fn test_dangling_parent_rejects_whole_batch() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_test_db(&dir);
    let dangling = format!(
        "{}|orphan|2024-01-01T08:00:00|2024-01-01T09:00:00|{}|",
        Uuid::new_v4(),
        Uuid::new_v4()
    );
    let path = write_file(
        &dir,
        "events.txt",
        &[valid_line("first"), dangling, valid_line("third")],
    );

    let controller = controller_for(store.clone(), store.clone());
    let job_id = controller.start_ingestion(&path).await.unwrap();
    let job = wait_terminal(&controller, job_id).await;

    // All three lines parsed, but the single trailing batch was rejected at
    // commit time, so every record in it is reclassified as an error.
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed_lines, 0);
    assert_eq!(job.error_lines, 3);
    assert_eq!(job.errors.len(), 1);
    assert_eq!(job.errors[0].line_number, None);
    assert!(job.errors[0].message.contains("batch commit failed"));
    assert_eq!(store.all_events().unwrap().len(), 0);
}

#[tokio::test]
async fn test_missing_file_creates_no_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_test_db(&dir);

    let controller = controller_for(store.clone(), store.clone());
    let result = controller
        .start_ingestion(dir.path().join("nope.txt").to_str().unwrap())
        .await;

    assert!(matches!(result, Err(IngestError::Unreadable { .. })));
    assert_eq!(store.stats().unwrap().job_count, 0);
}

// =============================================================================
// Batch accounting against the doubles
// =============================================================================

#[tokio::test]
async fn test_150_lines_commit_in_two_batches() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::reliable());
    let ledger = Arc::new(MemLedger::default());
    let total = BATCH_SIZE + 50;
    let lines: Vec<String> = (0..total).map(|i| valid_line(&format!("event {}", i))).collect();
    let path = write_file(&dir, "events.txt", &lines);

    let controller = controller_for(store.clone(), ledger.clone());
    let job_id = controller.start_ingestion(&path).await.unwrap();
    let job = wait_terminal(&controller, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed_lines, total as u64);
    assert_eq!(job.error_lines, 0);
    // One full batch, then the trailing 50
    assert_eq!(store.bulk_call_count(), 2);
    assert_eq!(store.event_count(), total);
}

#[tokio::test]
async fn test_second_commit_failure_only_counts_first_batch() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::failing_on(2));
    let ledger = Arc::new(MemLedger::default());
    let total = BATCH_SIZE + 50;
    let lines: Vec<String> = (0..total).map(|i| valid_line(&format!("event {}", i))).collect();
    let path = write_file(&dir, "events.txt", &lines);

    let controller = controller_for(store.clone(), ledger.clone());
    let job_id = controller.start_ingestion(&path).await.unwrap();
    let job = wait_terminal(&controller, job_id).await;

    // The second commit (50 events) failed: those lines are reclassified as
    // errors and the batch is discarded, not retried.
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed_lines, BATCH_SIZE as u64);
    assert_eq!(job.error_lines, 50);
    assert_eq!(job.errors.len(), 1);
    assert_eq!(job.errors[0].line_number, None);
    assert_eq!(store.event_count(), BATCH_SIZE);
    assert_eq!(ledger.job_count(), 1);
}

#[tokio::test]
async fn test_counter_flush_during_long_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore::reliable());
    let ledger = Arc::new(MemLedger::default());
    // 250 lines: flushes at 100 and 200, then the final update.
    let lines: Vec<String> = (0..250).map(|i| valid_line(&format!("event {}", i))).collect();
    let path = write_file(&dir, "events.txt", &lines);

    let controller = controller_for(store.clone(), ledger.clone());
    let job_id = controller.start_ingestion(&path).await.unwrap();
    let job = wait_terminal(&controller, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_lines, 250);
    assert_eq!(job.processed_lines + job.error_lines, 250);
    assert_eq!(store.event_count(), 250);
}

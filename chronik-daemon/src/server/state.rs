//! Shared application state for the server.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::ingest::{IngestEvent, IngestionController};
use crate::storage::{EventStore, Eventbase, JobLedger};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// DuckDB-backed store, shared by ingestion and analytics
    pub store: Arc<Eventbase>,
    /// Controller driving background ingestion jobs
    pub controller: IngestionController,
    /// Channel broadcasting ingestion progress events
    pub events_tx: broadcast::Sender<IngestEvent>,
    /// Daemon start time, for uptime reporting
    pub start_time: Instant,
}

impl AppState {
    /// Wire the controller to the store and ledger sides of the database.
    pub fn new(store: Arc<Eventbase>) -> Self {
        let (events_tx, _) = broadcast::channel(1000);
        let controller = IngestionController::new(
            Arc::clone(&store) as Arc<dyn EventStore>,
            Arc::clone(&store) as Arc<dyn JobLedger>,
            events_tx.clone(),
        );

        Self {
            store,
            controller,
            events_tx,
            start_time: Instant::now(),
        }
    }

    /// Subscribe to ingestion progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.events_tx.subscribe()
    }

    /// Seconds since the daemon started.
    pub fn uptime_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

//! HTTP server for the chronik daemon.
//!
//! Provides a REST API for:
//! - Health and status checks
//! - Submitting ingestion jobs and polling their progress
//! - Event lookup, search, and timeline reconstruction
//! - Interval analytics (overlaps, largest gap) and shortest-path queries

mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

//! HTTP routes and handlers for the chronik daemon API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use chronik_core::{
    build_timeline, find_largest_gap, find_overlaps, parse_timestamp, Gap, OverlapPair,
    TemporalGraph, TimelineNode,
};

use crate::ingest::IngestError;
use crate::storage::{EventFilter, EventStore, StoreStats};

use super::state::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and status
        .route("/health", get(health))
        .route("/status", get(status))
        // Ingestion
        .route("/ingest", post(ingest))
        .route("/jobs/:id", get(get_job))
        // Events
        .route("/events", get(search_events))
        .route("/events/:id", get(get_event))
        .route("/events/:id/timeline", get(timeline))
        // Analytics
        .route("/analysis/overlaps", get(overlaps))
        .route("/analysis/gap", get(largest_gap))
        .route("/analysis/path", get(shortest_path))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    duration_ms: u64,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T, duration_ms: u64) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms,
        })
    }

    fn err(error: impl ToString, duration_ms: u64) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            duration_ms,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// =============================================================================
// Health & Status
// =============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chronik-daemon"
    }))
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    uptime_seconds: f64,
    database_path: String,
    #[serde(flatten)]
    stats: StoreStats,
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let start = Instant::now();

    match state.store.stats() {
        Ok(stats) => {
            let data = StatusResponse {
                status: "running".to_string(),
                uptime_seconds: state.uptime_seconds(),
                database_path: state.store.path().display().to_string(),
                stats,
            };
            (StatusCode::OK, ApiResponse::ok(data, elapsed_ms(start)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
    }
}

// =============================================================================
// Ingestion
// =============================================================================

#[derive(Deserialize)]
struct IngestRequest {
    file_path: String,
}

#[derive(Serialize)]
struct IngestResponse {
    job_id: Uuid,
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> impl IntoResponse {
    let start = Instant::now();

    match state.controller.start_ingestion(&request.file_path).await {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            ApiResponse::ok(IngestResponse { job_id }, elapsed_ms(start)),
        ),
        Err(e @ IngestError::Unreadable { .. }) => (
            StatusCode::BAD_REQUEST,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
    }
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    let start = Instant::now();

    match state.controller.get_job_status(job_id) {
        Ok(Some(job)) => (StatusCode::OK, ApiResponse::ok(job, elapsed_ms(start))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ApiResponse::err(format!("no job with id {}", job_id), elapsed_ms(start)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Deserialize)]
struct SearchParams {
    name: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let start = Instant::now();

    let starts_after = match params.from.as_deref().map(require_timestamp).transpose() {
        Ok(t) => t,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                ApiResponse::err(e, elapsed_ms(start)),
            )
        }
    };
    let ends_before = match params.to.as_deref().map(require_timestamp).transpose() {
        Ok(t) => t,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                ApiResponse::err(e, elapsed_ms(start)),
            )
        }
    };

    let filter = EventFilter {
        name_contains: params.name,
        starts_after,
        ends_before,
        limit: params.limit,
        offset: params.offset.unwrap_or(0),
    };

    match state.store.search(&filter) {
        Ok(events) => (StatusCode::OK, ApiResponse::ok(events, elapsed_ms(start))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
    }
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<Uuid>,
) -> impl IntoResponse {
    let start = Instant::now();

    match state.store.find_by_id(event_id) {
        Ok(Some(event)) => (StatusCode::OK, ApiResponse::ok(event, elapsed_ms(start))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ApiResponse::err(format!("no event with id {}", event_id), elapsed_ms(start)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
    }
}

async fn timeline(
    State(state): State<Arc<AppState>>,
    Path(root_id): Path<Uuid>,
) -> impl IntoResponse {
    let start = Instant::now();

    // Root plus its recursive descendants is the whole subtree; no need to
    // scan unrelated events.
    let root = match state.store.find_by_id(root_id) {
        Ok(Some(root)) => root,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                ApiResponse::<TimelineNode>::err(
                    format!("no event with id {}", root_id),
                    elapsed_ms(start),
                ),
            )
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::err(e, elapsed_ms(start)),
            )
        }
    };

    let mut events = vec![root];
    match state.store.descendants(root_id) {
        Ok(descendants) => events.extend(descendants),
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::err(e, elapsed_ms(start)),
            )
        }
    }

    match build_timeline(root_id, &events) {
        Some(tree) => (StatusCode::OK, ApiResponse::ok(tree, elapsed_ms(start))),
        None => (
            StatusCode::NOT_FOUND,
            ApiResponse::err(format!("no event with id {}", root_id), elapsed_ms(start)),
        ),
    }
}

// =============================================================================
// Analytics
// =============================================================================

async fn overlaps(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let start = Instant::now();

    match state.store.all_events() {
        Ok(events) => {
            let pairs = find_overlaps(&events);
            (StatusCode::OK, ApiResponse::ok(pairs, elapsed_ms(start)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::<Vec<OverlapPair>>::err(e, elapsed_ms(start)),
        ),
    }
}

#[derive(Deserialize)]
struct GapParams {
    start: String,
    end: String,
}

#[derive(Serialize)]
struct GapResponse {
    found: bool,
    gap: Option<Gap>,
}

async fn largest_gap(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GapParams>,
) -> impl IntoResponse {
    let start = Instant::now();

    let (window_start, window_end) = match (
        require_timestamp(&params.start),
        require_timestamp(&params.end),
    ) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(e), _) | (_, Err(e)) => {
            return (
                StatusCode::BAD_REQUEST,
                ApiResponse::err(e, elapsed_ms(start)),
            )
        }
    };

    // Malformed windows are the boundary's job to reject.
    if window_start >= window_end {
        return (
            StatusCode::BAD_REQUEST,
            ApiResponse::err(
                "window start must be earlier than window end",
                elapsed_ms(start),
            ),
        );
    }

    match state.store.all_events() {
        Ok(events) => {
            let gap = find_largest_gap(&events, window_start, window_end);
            let data = GapResponse {
                found: gap.is_some(),
                gap,
            };
            (StatusCode::OK, ApiResponse::ok(data, elapsed_ms(start)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
    }
}

#[derive(Deserialize)]
struct PathParams {
    source: Uuid,
    target: Uuid,
}

#[derive(Serialize)]
struct PathResponse {
    found: bool,
    path: Vec<Uuid>,
    total_minutes: Option<i64>,
}

async fn shortest_path(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PathParams>,
) -> impl IntoResponse {
    let start = Instant::now();

    // A degenerate source == target query is invalid input, not a path.
    if params.source == params.target {
        return (
            StatusCode::BAD_REQUEST,
            ApiResponse::err("source and target must differ", elapsed_ms(start)),
        );
    }

    match state.store.all_events() {
        Ok(events) => {
            let graph = TemporalGraph::from_events(&events);
            let data = match graph.shortest_path(params.source, params.target) {
                Some(result) => PathResponse {
                    found: true,
                    path: result.path,
                    total_minutes: Some(result.total_minutes),
                },
                None => PathResponse {
                    found: false,
                    path: Vec::new(),
                    total_minutes: None,
                },
            };
            (StatusCode::OK, ApiResponse::ok(data, elapsed_ms(start)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::err(e, elapsed_ms(start)),
        ),
    }
}

fn require_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    parse_timestamp(value).ok_or_else(|| format!("invalid timestamp {:?}", value))
}

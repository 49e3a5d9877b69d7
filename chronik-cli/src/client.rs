//! HTTP client for the chronik daemon API.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use chronik_core::{Event, Gap, OverlapPair, TimelineNode};
use chronik_daemon::storage::JobSnapshot;

/// Response envelope used by every daemon endpoint except `/health`.
#[derive(Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct IngestReply {
    pub job_id: Uuid,
}

#[derive(Deserialize)]
pub struct GapReply {
    pub found: bool,
    pub gap: Option<Gap>,
}

#[derive(Deserialize)]
pub struct PathReply {
    pub found: bool,
    pub path: Vec<Uuid>,
    pub total_minutes: Option<i64>,
}

/// Typed client over the daemon's REST API.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("cannot reach daemon at {}", self.base_url))?;
        response.json().await.context("invalid health response")
    }

    pub async fn ingest(&self, file_path: &str) -> Result<IngestReply> {
        let response = self
            .http
            .post(format!("{}/ingest", self.base_url))
            .json(&serde_json::json!({ "file_path": file_path }))
            .send()
            .await
            .with_context(|| format!("cannot reach daemon at {}", self.base_url))?;
        unwrap_envelope(response).await
    }

    pub async fn job(&self, job_id: Uuid) -> Result<JobSnapshot> {
        self.get_json(&format!("/jobs/{}", job_id), &[]).await
    }

    pub async fn events(
        &self,
        name: Option<String>,
        from: Option<String>,
        to: Option<String>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Event>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(name) = name {
            query.push(("name", name));
        }
        if let Some(from) = from {
            query.push(("from", from));
        }
        if let Some(to) = to {
            query.push(("to", to));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }
        self.get_json("/events", &query).await
    }

    pub async fn timeline(&self, root_id: Uuid) -> Result<TimelineNode> {
        self.get_json(&format!("/events/{}/timeline", root_id), &[])
            .await
    }

    pub async fn overlaps(&self) -> Result<Vec<OverlapPair>> {
        self.get_json("/analysis/overlaps", &[]).await
    }

    pub async fn gap(&self, start: &str, end: &str) -> Result<GapReply> {
        self.get_json(
            "/analysis/gap",
            &[("start", start.to_string()), ("end", end.to_string())],
        )
        .await
    }

    pub async fn path(&self, source: Uuid, target: Uuid) -> Result<PathReply> {
        self.get_json(
            "/analysis/path",
            &[
                ("source", source.to_string()),
                ("target", target.to_string()),
            ],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        tracing::debug!("GET {}{}", self.base_url, path);
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("cannot reach daemon at {}", self.base_url))?;
        unwrap_envelope(response).await
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let envelope: ApiEnvelope<T> = response
        .json()
        .await
        .context("invalid response from daemon")?;

    if envelope.success {
        envelope
            .data
            .ok_or_else(|| anyhow!("daemon returned an empty response"))
    } else {
        Err(anyhow!(envelope
            .error
            .unwrap_or_else(|| "unknown daemon error".to_string())))
    }
}

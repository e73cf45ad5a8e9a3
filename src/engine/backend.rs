//! Backend gateway client.
//!
//! Thin wrapper over the search service's HTTP contract. Each operation is a
//! single request with no implicit retry; failures are normalized into
//! `ApiError` and surfaced once to the caller.

use crate::model::{ApiError, ExportFormat, JobStatus, ResultSet, SearchConfig, SearchRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The five operations the search service exposes. Behind a trait so tests
/// and the engine can run against a scripted backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Start a search job; returns the server-assigned job id.
    async fn submit_search(&self, req: &SearchRequest) -> Result<String, ApiError>;
    async fn poll_status(&self, job_id: &str) -> Result<JobStatus, ApiError>;
    async fn fetch_results(&self, job_id: &str) -> Result<ResultSet, ApiError>;
    /// Request an export; returns the download URL exactly as the server sent
    /// it (possibly relative to the service origin).
    async fn request_export(&self, job_id: &str, format: ExportFormat) -> Result<String, ApiError>;
    /// Best-effort cancel. A failure here never alters job state; the job
    /// keeps polling until the server itself reports a terminal status.
    async fn cancel_job(&self, job_id: &str) -> Result<(), ApiError>;
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Deserialize)]
struct ExportResponse {
    #[serde(rename = "downloadUrl")]
    download_url: String,
}

#[derive(Serialize)]
struct ExportRequestBody<'a> {
    #[serde(rename = "jobId")]
    job_id: &'a str,
    format: ExportFormat,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(cfg: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport(op: &str, err: reqwest::Error) -> ApiError {
    ApiError::Transport(format!("{op} request failed: {err}"))
}

fn unexpected_status(op: &str, status: reqwest::StatusCode) -> ApiError {
    ApiError::Transport(format!("{op} request returned HTTP {status}"))
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn submit_search(&self, req: &SearchRequest) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(self.url("/api/search"))
            .json(req)
            .send()
            .await
            .map_err(|e| transport("search", e))?;
        if !resp.status().is_success() {
            return Err(unexpected_status("search", resp.status()));
        }
        let body: SubmitResponse = resp.json().await.map_err(|e| transport("search", e))?;
        Ok(body.job_id)
    }

    async fn poll_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/status/{job_id}")))
            .send()
            .await
            .map_err(|e| transport("status", e))?;
        if !resp.status().is_success() {
            return Err(unexpected_status("status", resp.status()));
        }
        resp.json().await.map_err(|e| transport("status", e))
    }

    async fn fetch_results(&self, job_id: &str) -> Result<ResultSet, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/results/{job_id}")))
            .send()
            .await
            .map_err(|e| transport("results", e))?;
        if !resp.status().is_success() {
            return Err(unexpected_status("results", resp.status()));
        }
        resp.json().await.map_err(|e| transport("results", e))
    }

    async fn request_export(&self, job_id: &str, format: ExportFormat) -> Result<String, ApiError> {
        let resp = self
            .client
            .post(self.url("/api/export"))
            .json(&ExportRequestBody { job_id, format })
            .send()
            .await
            .map_err(|e| ApiError::Export(format!("export request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            // The export endpoint reports a human-readable `detail` on failure.
            let detail = resp
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.detail)
                .filter(|d| !d.is_empty());
            return Err(ApiError::Export(
                detail.unwrap_or_else(|| format!("export request returned HTTP {status}")),
            ));
        }
        let body: ExportResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Export(format!("export request failed: {e}")))?;
        Ok(body.download_url)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url(&format!("/api/cancel/{job_id}")))
            .send()
            .await
            .map_err(|e| transport("cancel", e))?;
        if !resp.status().is_success() {
            return Err(unexpected_status("cancel", resp.status()));
        }
        // Response body is ignored.
        Ok(())
    }
}

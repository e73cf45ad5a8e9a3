use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Validated search parameters, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub city: String,
    pub query: String,
    pub limit: u32,
}

/// Identifies one server-side job and the client generation that created it.
///
/// The generation is bumped on every submission; events tagged with an older
/// generation belong to an abandoned job and are discarded on application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub generation: u64,
    pub job_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
    Canceled,
}

impl JobState {
    /// Terminal states admit no further transitions for the job.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error | JobState::Canceled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Error => "error",
            JobState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Server-reported job progress. Only poll responses mutate this; the client
/// never computes progress locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatus {
    /// Status shown between a successful submit and the first poll response.
    pub fn seeded() -> Self {
        Self {
            status: JobState::Queued,
            progress: 0,
            message: "Job created, waiting to run.".into(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub delivery: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub maps_url: Option<String>,
}

/// Full result set for a job. Replaced wholesale on every fetch, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub results: Vec<ResultRow>,
    /// May exceed `results.len()` when the server applies a cap.
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloadable export reference. Valid only while the job's result set is
/// unchanged; superseded along with everything else on a new search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArtifact {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    pub format: ExportFormat,
}

/// Errors surfaced by backend operations. Kept clonable and comparable so
/// events can carry them and callers can match on kind instead of messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Export(String),
}

/// Events emitted by the controller, the job engine, and the export task,
/// consumed by presentation layers through the session state machine.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A new search superseded whatever came before; the session resets.
    SearchStarted {
        generation: u64,
        request: SearchRequest,
    },
    /// The backend accepted the search and assigned a job id.
    Submitted { job: JobHandle, status: JobStatus },
    /// One poll response.
    Status { job: JobHandle, status: JobStatus },
    /// Results fetched after a `done` status.
    Results { job: JobHandle, set: ResultSet },
    /// Submit, poll, or post-done results fetch failed; polling has stopped.
    Failed { generation: u64, error: ApiError },
    /// The engine for this generation has finished, for any reason.
    Settled { generation: u64 },
    ExportStarted {
        generation: u64,
        format: ExportFormat,
    },
    ExportReady {
        generation: u64,
        artifact: ExportArtifact,
    },
    ExportFailed { generation: u64, error: ApiError },
    /// Free-form notices (cancel acknowledgements and the like).
    Info(String),
}

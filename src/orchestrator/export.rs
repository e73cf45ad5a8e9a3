//! Export sequencing.
//!
//! One task per export request; the controller refuses to start a second one
//! while the first is pending. The server may return a relative download
//! path, which is resolved against the configured API base before anyone
//! sees it.

use crate::engine::SearchBackend;
use crate::model::{ExportArtifact, ExportFormat, JobEvent, JobHandle};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub(crate) async fn run_export(
    backend: Arc<dyn SearchBackend>,
    base_url: String,
    job: JobHandle,
    format: ExportFormat,
    event_tx: UnboundedSender<JobEvent>,
) {
    let generation = job.generation;
    let _ = event_tx.send(JobEvent::ExportStarted { generation, format });
    match backend.request_export(&job.job_id, format).await {
        Ok(raw_url) => {
            let artifact = ExportArtifact {
                download_url: resolve_download_url(&base_url, &raw_url),
                format,
            };
            log::info!("export ready for job {}: {}", job.job_id, artifact.download_url);
            let _ = event_tx.send(JobEvent::ExportReady {
                generation,
                artifact,
            });
        }
        Err(error) => {
            log::warn!("export for job {} failed: {error}", job.job_id);
            let _ = event_tx.send(JobEvent::ExportFailed { generation, error });
        }
    }
}

/// Resolve a server-provided download URL to an absolute locator.
pub fn resolve_download_url(base_url: &str, raw: &str) -> String {
    if raw.starts_with("http") {
        return raw.to_owned();
    }
    let base = base_url.trim_end_matches('/');
    if raw.starts_with('/') {
        format!("{base}{raw}")
    } else {
        format!("{base}/{raw}")
    }
}

//! Owned session state for the single active job.
//!
//! The session is the authoritative client-side model of job progress. It is
//! mutated exclusively through [`SearchSession::apply`], which drops any event
//! tagged with a generation other than the active one, so late callbacks from
//! an abandoned job can never regress the state of its successor.

use crate::model::{ExportArtifact, JobEvent, JobHandle, JobState, JobStatus, ResultRow};

#[derive(Debug, Default)]
pub struct SearchSession {
    generation: u64,
    job: Option<JobHandle>,
    status: Option<JobStatus>,
    results: Vec<ResultRow>,
    total: u64,
    error: Option<String>,
    artifact: Option<ExportArtifact>,
    submitting: bool,
    exporting: bool,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    pub fn status(&self) -> Option<&JobStatus> {
        self.status.as_ref()
    }

    pub fn results(&self) -> &[ResultRow] {
        &self.results
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn artifact(&self) -> Option<&ExportArtifact> {
        self.artifact.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// The job is still being worked on by the server.
    pub fn is_running(&self) -> bool {
        matches!(
            self.status.as_ref().map(|s| s.status),
            Some(JobState::Queued) | Some(JobState::Running)
        )
    }

    /// Export is meaningful only for a finished job with something to export.
    /// Recomputed on every read, never stored.
    pub fn can_export(&self) -> bool {
        self.status.as_ref().map(|s| s.status) == Some(JobState::Done) && !self.results.is_empty()
    }

    /// Apply an event. Returns false when the event was discarded because it
    /// belongs to a superseded generation.
    pub fn apply(&mut self, event: &JobEvent) -> bool {
        match event {
            JobEvent::SearchStarted { generation, .. } => {
                if *generation <= self.generation {
                    return self.discard(*generation, "SearchStarted");
                }
                // Reset everything before the new request's events arrive.
                self.generation = *generation;
                self.job = None;
                self.status = None;
                self.results.clear();
                self.total = 0;
                self.error = None;
                self.artifact = None;
                self.submitting = true;
                self.exporting = false;
            }
            JobEvent::Submitted { job, status } => {
                if !self.accepts(job.generation) {
                    return self.discard(job.generation, "Submitted");
                }
                self.job = Some(job.clone());
                self.status = Some(status.clone());
            }
            JobEvent::Status { job, status } => {
                if !self.accepts(job.generation) {
                    return self.discard(job.generation, "Status");
                }
                if status.status.is_terminal() {
                    self.submitting = false;
                }
                self.status = Some(status.clone());
            }
            JobEvent::Results { job, set } => {
                if !self.accepts(job.generation) {
                    return self.discard(job.generation, "Results");
                }
                // Replace, never merge.
                self.results = set.results.clone();
                self.total = set.total;
            }
            JobEvent::Failed { generation, error } => {
                if !self.accepts(*generation) {
                    return self.discard(*generation, "Failed");
                }
                // The last applied status stands; a failed results fetch does
                // not revert a terminal `done`.
                self.error = Some(error.to_string());
                self.submitting = false;
            }
            JobEvent::Settled { generation } => {
                if !self.accepts(*generation) {
                    return self.discard(*generation, "Settled");
                }
                self.submitting = false;
            }
            JobEvent::ExportStarted { generation, .. } => {
                if !self.accepts(*generation) {
                    return self.discard(*generation, "ExportStarted");
                }
                self.exporting = true;
            }
            JobEvent::ExportReady {
                generation,
                artifact,
            } => {
                if !self.accepts(*generation) {
                    return self.discard(*generation, "ExportReady");
                }
                self.exporting = false;
                self.artifact = Some(artifact.clone());
            }
            JobEvent::ExportFailed { generation, error } => {
                if !self.accepts(*generation) {
                    return self.discard(*generation, "ExportFailed");
                }
                // Re-enabled for retry.
                self.exporting = false;
                self.error = Some(error.to_string());
            }
            JobEvent::Info(_) => {}
        }
        true
    }

    fn accepts(&self, generation: u64) -> bool {
        generation == self.generation && generation != 0
    }

    fn discard(&self, generation: u64, kind: &str) -> bool {
        log::debug!(
            "discarding {kind} event for generation {generation} (active {})",
            self.generation
        );
        false
    }
}

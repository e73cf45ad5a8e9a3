mod backend;

pub use backend::{HttpBackend, SearchBackend};

use crate::model::{JobEvent, JobHandle, JobState, JobStatus, SearchConfig, SearchRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub enum EngineControl {
    /// Ask the server to cancel the job. Cooperative: polling continues until
    /// the server reports a terminal status.
    CancelRequest,
}

/// Drives one job from submission to settlement.
///
/// All observable output goes through the event channel; every job-scoped
/// event carries the `JobHandle` so consumers can discard anything that
/// belongs to a superseded job.
pub struct JobEngine {
    cfg: SearchConfig,
    backend: Arc<dyn SearchBackend>,
}

impl JobEngine {
    pub fn new(cfg: SearchConfig, backend: Arc<dyn SearchBackend>) -> Self {
        Self { cfg, backend }
    }

    pub async fn run(
        self,
        generation: u64,
        request: SearchRequest,
        event_tx: mpsc::UnboundedSender<JobEvent>,
        mut control_rx: mpsc::UnboundedReceiver<EngineControl>,
    ) {
        let job_id = match self.backend.submit_search(&request).await {
            Ok(id) => id,
            Err(e) => {
                let _ = event_tx.send(JobEvent::Failed {
                    generation,
                    error: e,
                });
                let _ = event_tx.send(JobEvent::Settled { generation });
                return;
            }
        };
        let job = JobHandle { generation, job_id };
        log::debug!("job {} submitted (generation {})", job.job_id, generation);
        let _ = event_tx.send(JobEvent::Submitted {
            job: job.clone(),
            status: JobStatus::seeded(),
        });

        // Control listener relays cancel requests while the poll loop runs.
        // Exits when the controller drops its sender.
        let cancel_backend = self.backend.clone();
        let cancel_job = job.clone();
        let cancel_tx = event_tx.clone();
        let control_handle = tokio::spawn(async move {
            while let Some(EngineControl::CancelRequest) = control_rx.recv().await {
                match cancel_backend.cancel_job(&cancel_job.job_id).await {
                    Ok(()) => {
                        let _ = cancel_tx.send(JobEvent::Info("Cancel requested.".into()));
                    }
                    Err(e) => {
                        let _ = cancel_tx.send(JobEvent::Info(format!("Cancel failed: {e}")));
                    }
                }
            }
        });

        let mut ticker = tokio::time::interval(self.cfg.poll_interval);
        // Each poll is awaited to completion before the next tick is taken,
        // so two polls for the same job can never be in flight at once. A
        // slow response delays the next tick instead of bursting to catch up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // the first tick completes immediately

        loop {
            ticker.tick().await;
            match self.backend.poll_status(&job.job_id).await {
                Ok(status) => {
                    let state = status.status;
                    let _ = event_tx.send(JobEvent::Status {
                        job: job.clone(),
                        status,
                    });
                    if !state.is_terminal() {
                        continue;
                    }
                    log::debug!("job {} reached terminal state {state}", job.job_id);
                    if state == JobState::Done {
                        // Exactly once per job, immediately after `done`. A
                        // fetch failure is surfaced but the terminal status
                        // stands.
                        match self.backend.fetch_results(&job.job_id).await {
                            Ok(set) => {
                                let _ = event_tx.send(JobEvent::Results {
                                    job: job.clone(),
                                    set,
                                });
                            }
                            Err(e) => {
                                let _ = event_tx.send(JobEvent::Failed {
                                    generation,
                                    error: e,
                                });
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    // No retry: polling halts and the failure is surfaced once.
                    log::warn!("poll for job {} failed: {e}", job.job_id);
                    let _ = event_tx.send(JobEvent::Failed {
                        generation,
                        error: e,
                    });
                    break;
                }
            }
        }

        // Dropping the JoinHandle would leave the listener parked on recv();
        // abort it so a settled engine holds no tasks.
        control_handle.abort();
        let _ = event_tx.send(JobEvent::Settled { generation });
    }
}

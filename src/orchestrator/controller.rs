//! Run lifecycle controller.
//!
//! Owns the single active-job slot: spawns one engine task per submission,
//! aborts the previous one on supersede, and routes cancel/export commands to
//! the generation they were issued against.

use super::export;
use crate::engine::{EngineControl, JobEngine, SearchBackend};
use crate::model::{ExportFormat, JobEvent, JobHandle, SearchConfig, SearchRequest};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
///
/// Cancel and export carry the handle the caller believes is current; the
/// controller drops them silently when that handle has been superseded.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Submit(SearchRequest),
    Cancel { job: JobHandle },
    Export { job: JobHandle, format: ExportFormat },
    Quit,
}

/// Handle for the engine task of the active generation.
struct RunCtx {
    generation: u64,
    ctrl_tx: UnboundedSender<EngineControl>,
    handle: tokio::task::JoinHandle<()>,
}

pub async fn run_controller(
    cfg: SearchConfig,
    backend: Arc<dyn SearchBackend>,
    event_tx: UnboundedSender<JobEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut generation: u64 = 0;
    let mut run_ctx: Option<RunCtx> = None;
    let mut export_task: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            UiCommand::Submit(request) => {
                // Supersede: the old engine must not outlive its job slot.
                // Aborting also drops its control sender, which unparks the
                // engine's cancel listener. Stale events that already sit in
                // the channel are filtered by the session generation guard.
                if let Some(ctx) = run_ctx.take() {
                    log::debug!("superseding generation {}", ctx.generation);
                    ctx.handle.abort();
                }
                if let Some(handle) = export_task.take() {
                    handle.abort();
                }

                generation += 1;
                let _ = event_tx.send(JobEvent::SearchStarted {
                    generation,
                    request: request.clone(),
                });

                let (ctrl_tx, ctrl_rx) = unbounded_channel::<EngineControl>();
                let engine = JobEngine::new(cfg.clone(), backend.clone());
                let engine_tx = event_tx.clone();
                let handle = tokio::spawn(async move {
                    engine.run(generation, request, engine_tx, ctrl_rx).await;
                });
                run_ctx = Some(RunCtx {
                    generation,
                    ctrl_tx,
                    handle,
                });
            }
            UiCommand::Cancel { job } => {
                match &run_ctx {
                    Some(ctx) if ctx.generation == job.generation => {
                        let _ = ctx.ctrl_tx.send(EngineControl::CancelRequest);
                    }
                    _ => log::debug!("dropping cancel for superseded job {}", job.job_id),
                }
            }
            UiCommand::Export { job, format } => {
                if job.generation != generation {
                    log::debug!("dropping export for superseded job {}", job.job_id);
                    continue;
                }
                // The UI disables its trigger while an export is pending;
                // this is the backstop that guarantees no second request.
                if export_task.as_ref().is_some_and(|h| !h.is_finished()) {
                    continue;
                }
                export_task = Some(tokio::spawn(export::run_export(
                    backend.clone(),
                    cfg.base_url.clone(),
                    job,
                    format,
                    event_tx.clone(),
                )));
            }
            UiCommand::Quit => break,
        }
    }

    if let Some(ctx) = run_ctx.take() {
        ctx.handle.abort();
    }
    if let Some(handle) = export_task.take() {
        handle.abort();
    }
    Ok(())
}

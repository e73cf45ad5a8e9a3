use crate::engine::{HttpBackend, SearchBackend};
use crate::model::{ExportFormat, JobEvent, JobState, ResultRow, SearchConfig, SearchRequest};
use crate::orchestrator::{run_controller, UiCommand};
use crate::session::SearchSession;
use crate::text_summary;
use crate::validate::{validate, RawSearchInput};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const BASE_URL_ENV: &str = "MAPSEARCH_API_BASE";

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "mapsearch-cli",
    version,
    about = "Client for asynchronous place-search jobs, with optional TUI"
)]
pub struct Cli {
    /// City to search in (e.g. "São Paulo, SP")
    #[arg(long)]
    pub city: String,

    /// Business type or free-text query (e.g. "pizzerias")
    #[arg(long)]
    pub query: String,

    /// Maximum results per job; clamped to 1..=50, non-numeric falls back to 20
    #[arg(long, default_value = "20")]
    pub limit: String,

    /// Base URL of the search service (MAPSEARCH_API_BASE overrides the default)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Job status poll interval
    #[arg(long, default_value = "1500ms")]
    pub poll_interval: humantime::Duration,

    /// Timeout for individual backend requests
    #[arg(long, default_value = "10s")]
    pub request_timeout: humantime::Duration,

    /// Print the final result set as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print progress lines and a result table, then exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,

    /// Request an export once the job is done and report the download URL
    #[arg(long, value_parser = parse_export_format)]
    pub export: Option<ExportFormat>,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,
}

fn parse_export_format(s: &str) -> std::result::Result<ExportFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "csv" => Ok(ExportFormat::Csv),
        "xlsx" => Ok(ExportFormat::Xlsx),
        _ => Err(format!("unknown export format `{s}` (expected csv or xlsx)")),
    }
}

/// Build a `SearchConfig` from CLI arguments and the environment.
pub fn build_config(args: &Cli) -> SearchConfig {
    let base_url = args
        .base_url
        .clone()
        .or_else(|| std::env::var(BASE_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
    SearchConfig {
        base_url: base_url.trim_end_matches('/').to_owned(),
        poll_interval: Duration::from(args.poll_interval),
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("mapsearch-cli/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Validate CLI parameters into a submittable request.
pub fn build_request(args: &Cli) -> Result<SearchRequest> {
    let raw = RawSearchInput {
        city: args.city.clone(),
        query: args.query.clone(),
        limit: args.limit.clone(),
    };
    let request = validate(&raw).context("invalid search parameters")?;
    if request.limit.to_string() != args.limit.trim() {
        // The clamp itself is silent; keep a trace of the effective value.
        log::debug!("limit {:?} normalized to {}", args.limit, request.limit);
    }
    Ok(request)
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    if args.silent {
        return run_job(args, true).await;
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_job(args, false).await;
    }

    run_text(args).await
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    results: &'a [ResultRow],
    total: u64,
    #[serde(rename = "downloadUrl", skip_serializing_if = "Option::is_none")]
    download_url: Option<&'a str>,
}

/// Run one search to settlement and print the result set as JSON.
/// `silent` suppresses the output entirely; only the exit code remains.
async fn run_job(args: Cli, silent: bool) -> Result<()> {
    let cfg = build_config(&args);
    let request = build_request(&args)?;
    let backend: Arc<dyn SearchBackend> = Arc::new(HttpBackend::new(&cfg)?);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<JobEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = tokio::spawn(run_controller(cfg, backend, event_tx, cmd_rx));

    let _ = cmd_tx.send(UiCommand::Submit(request));

    let mut session = SearchSession::new();
    let mut pending_export = args.export;
    while let Some(ev) = event_rx.recv().await {
        if !session.apply(&ev) {
            continue;
        }
        match &ev {
            JobEvent::Settled { .. } => {
                match (pending_export.take(), session.can_export(), session.job()) {
                    (Some(format), true, Some(job)) => {
                        let _ = cmd_tx.send(UiCommand::Export {
                            job: job.clone(),
                            format,
                        });
                    }
                    _ => break,
                }
            }
            JobEvent::ExportReady { .. } | JobEvent::ExportFailed { .. } => break,
            _ => {}
        }
    }

    let _ = cmd_tx.send(UiCommand::Quit);
    controller.await.context("controller task failed")??;

    if !silent {
        let out = JsonOutput {
            results: session.results(),
            total: session.total(),
            download_url: session.artifact().map(|a| a.download_url.as_str()),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    session_outcome(&session)
}

/// Run one search to settlement, printing progress to stderr and the final
/// table to stdout.
async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let request = build_request(&args)?;
    let backend: Arc<dyn SearchBackend> = Arc::new(HttpBackend::new(&cfg)?);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<JobEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = tokio::spawn(run_controller(cfg, backend, event_tx, cmd_rx));
    let (out_tx, out_handle) = spawn_output_writer();

    let _ = cmd_tx.send(UiCommand::Submit(request));

    let mut session = SearchSession::new();
    let mut pending_export = args.export;
    while let Some(ev) = event_rx.recv().await {
        if !session.apply(&ev) {
            continue;
        }
        match &ev {
            JobEvent::SearchStarted { request, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "Searching \"{}\" in {} (limit {})",
                    request.query, request.city, request.limit
                )));
            }
            JobEvent::Submitted { job, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Job {} created.", job.job_id)));
            }
            JobEvent::Status { status, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "[{:>3}%] {}",
                    status.progress, status.message
                )));
                if let Some(err) = &status.error {
                    let _ = out_tx.send(OutputLine::Stderr(format!("Server error: {err}")));
                }
            }
            JobEvent::Failed { error, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Error: {error}")));
            }
            JobEvent::Info(msg) => {
                let _ = out_tx.send(OutputLine::Stderr(msg.clone()));
            }
            JobEvent::ExportStarted { format, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Requesting {format} export…")));
            }
            JobEvent::ExportReady { .. } | JobEvent::ExportFailed { .. } => break,
            JobEvent::Settled { .. } => {
                match (pending_export.take(), session.can_export(), session.job()) {
                    (Some(format), true, Some(job)) => {
                        let _ = cmd_tx.send(UiCommand::Export {
                            job: job.clone(),
                            format,
                        });
                    }
                    _ => break,
                }
            }
            JobEvent::Results { .. } => {}
        }
    }

    let _ = cmd_tx.send(UiCommand::Quit);
    controller.await.context("controller task failed")??;

    let summary = text_summary::build_result_table(session.results(), session.total());
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    if let Some(artifact) = session.artifact() {
        let _ = out_tx.send(OutputLine::Stdout(format!(
            "Download: {}",
            artifact.download_url
        )));
    }

    drop(out_tx);
    let _ = out_handle.await;

    session_outcome(&session)
}

/// Map the settled session onto the process outcome.
fn session_outcome(session: &SearchSession) -> Result<()> {
    if let Some(status) = session.status() {
        if status.status == JobState::Error {
            let detail = status.error.as_deref().unwrap_or(status.message.as_str());
            anyhow::bail!("search job failed: {detail}");
        }
    }
    if let Some(err) = session.error() {
        anyhow::bail!("{err}");
    }
    Ok(())
}

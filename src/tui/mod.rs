//! TUI frontend: single-screen job progress and results view.

use crate::cli::Cli;
use crate::engine::{HttpBackend, SearchBackend};
use crate::model::{ExportFormat, JobEvent, JobState, SearchRequest};
use crate::orchestrator::{run_controller, UiCommand};
use crate::session::SearchSession;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::io;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

struct UiState {
    session: SearchSession,
    request: SearchRequest,
    info: String,
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = crate::cli::build_config(&args);
    let request = crate::cli::build_request(&args)?;
    let backend: Arc<dyn SearchBackend> = Arc::new(HttpBackend::new(&cfg)?);

    // Unbounded channels avoid backpressure between the UI thread and the runtime.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<JobEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(request, event_rx, cmd_tx));

    let res = run_controller(cfg, backend, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    request: SearchRequest,
    mut event_rx: UnboundedReceiver<JobEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState {
        session: SearchSession::new(),
        request,
        info: String::new(),
    };

    // Kick off the first search immediately.
    let _ = cmd_tx.send(UiCommand::Submit(state.request.clone()));

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('r')) => {
                        // Supersedes the running job, if any.
                        state.info = "Restarting search…".into();
                        let _ = cmd_tx.send(UiCommand::Submit(state.request.clone()));
                    }
                    (_, KeyCode::Char('c')) => {
                        if state.session.is_running() {
                            if let Some(job) = state.session.job() {
                                let _ = cmd_tx.send(UiCommand::Cancel { job: job.clone() });
                            }
                        }
                    }
                    (_, KeyCode::Char('e')) => {
                        request_export(&mut state, &cmd_tx, ExportFormat::Csv)
                    }
                    (_, KeyCode::Char('x')) => {
                        request_export(&mut state, &cmd_tx, ExportFormat::Xlsx)
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

fn request_export(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, format: ExportFormat) {
    if !state.session.can_export() {
        state.info = "Nothing to export yet.".into();
        return;
    }
    // The trigger is inert while an export is pending.
    if state.session.is_exporting() {
        return;
    }
    if let Some(job) = state.session.job() {
        let _ = cmd_tx.send(UiCommand::Export {
            job: job.clone(),
            format,
        });
    }
}

fn apply_event(state: &mut UiState, ev: JobEvent) {
    if !state.session.apply(&ev) {
        return;
    }
    match ev {
        JobEvent::Submitted { job, .. } => {
            state.info = format!("Job {} created.", job.job_id);
        }
        JobEvent::Failed { error, .. } => {
            state.info = error.to_string();
        }
        JobEvent::ExportReady { artifact, .. } => {
            // One-shot convenience: the persistent link stays in the status panel.
            state.info = match copy_to_clipboard(&artifact.download_url) {
                Ok(()) => "Export ready, URL copied to clipboard.".into(),
                Err(_) => "Export ready.".into(),
            };
        }
        JobEvent::ExportFailed { error, .. } => {
            state.info = format!("Export failed: {error}");
        }
        JobEvent::Info(msg) => state.info = msg,
        JobEvent::Settled { .. } => {
            if state.session.status().map(|s| s.status) == Some(JobState::Done) {
                state.info = format!(
                    "Search finished: {} result(s).",
                    state.session.results().len()
                );
            }
        }
        _ => {}
    }
}

fn draw(f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, chunks[0], state);
    draw_gauge(f, chunks[1], state);
    draw_status(f, chunks[2], state);
    draw_results(f, chunks[3], state);
    draw_footer(f, chunks[4]);
}

fn draw_header(f: &mut Frame, area: Rect, state: &UiState) {
    let text = format!(
        "\"{}\" in {} (limit {})",
        state.request.query, state.request.city, state.request.limit
    );
    let header = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title("mapsearch"),
    );
    f.render_widget(header, area);
}

fn draw_gauge(f: &mut Frame, area: Rect, state: &UiState) {
    let (percent, label) = match state.session.status() {
        Some(s) => (
            u16::from(s.progress.min(100)),
            format!("{}% · {}", s.progress, s.status),
        ),
        None if state.session.is_submitting() => (0, "submitting…".into()),
        None => (0, "idle".into()),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(percent)
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_status(f: &mut Frame, area: Rect, state: &UiState) {
    let mut lines: Vec<Line<'static>> = Vec::new();

    let message = state
        .session
        .status()
        .map(|s| s.message.clone())
        .unwrap_or_else(|| "Waiting…".into());
    lines.push(Line::from(vec![
        Span::styled("Status: ", Style::default().fg(Color::Gray)),
        Span::raw(message),
    ]));

    if let Some(err) = state.session.status().and_then(|s| s.error.clone()) {
        lines.push(Line::from(Span::styled(
            err,
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(err) = state.session.error() {
        lines.push(Line::from(Span::styled(
            err.to_owned(),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(artifact) = state.session.artifact() {
        lines.push(Line::from(vec![
            Span::styled("Download: ", Style::default().fg(Color::Gray)),
            Span::styled(
                artifact.download_url.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        ]));
    }
    if !state.info.is_empty() {
        lines.push(Line::from(Span::styled(
            state.info.clone(),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let status = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Job"));
    f.render_widget(status, area);
}

fn draw_results(f: &mut Frame, area: Rect, state: &UiState) {
    let header = Row::new(["Name", "Address", "Phone", "Delivery", "Website"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = state
        .session
        .results()
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.name.clone()),
                Cell::from(r.address.clone().unwrap_or_else(|| "-".into())),
                Cell::from(r.phone.clone().unwrap_or_else(|| "-".into())),
                Cell::from(r.delivery.clone().unwrap_or_else(|| "-".into())),
                Cell::from(r.website.clone().unwrap_or_else(|| "-".into())),
            ])
        })
        .collect();

    let title = format!("Results · {} found", state.session.total());
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(26),
            Constraint::Percentage(30),
            Constraint::Percentage(16),
            Constraint::Percentage(10),
            Constraint::Percentage(18),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let keys = "q quit · r restart · c cancel · e export csv · x export xlsx";
    let footer = Paragraph::new(Span::styled(keys, Style::default().fg(Color::DarkGray)));
    f.render_widget(footer, area);
}

/// Initialize the clipboard manager thread if not already initialized.
/// A dedicated thread processes copies sequentially and keeps each clipboard
/// instance alive long enough for clipboard managers to read it.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Copy text to clipboard without blocking the UI thread.
fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

use async_trait::async_trait;
use mapsearch_cli::engine::SearchBackend;
use mapsearch_cli::model::{
    ApiError, ExportFormat, JobEvent, JobHandle, JobState, JobStatus, ResultRow, ResultSet,
    SearchConfig, SearchRequest,
};
use mapsearch_cli::orchestrator::{run_controller, UiCommand};
use mapsearch_cli::session::SearchSession;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Backend stub for controller-level sequencing tests. Polls replay a script
/// and then report `running` forever; submits hand out sequential job ids.
struct StubBackend {
    statuses: Mutex<VecDeque<JobStatus>>,
    results: ResultSet,
    submits: AtomicUsize,
    exports: AtomicUsize,
    cancels: AtomicUsize,
    export_delay: Duration,
}

impl StubBackend {
    fn new(statuses: Vec<JobStatus>, results: ResultSet) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.into()),
            results,
            submits: AtomicUsize::new(0),
            exports: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            export_delay: Duration::from_millis(50),
        })
    }
}

#[async_trait]
impl SearchBackend for StubBackend {
    async fn submit_search(&self, _req: &SearchRequest) -> Result<String, ApiError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{n}"))
    }

    async fn poll_status(&self, _job_id: &str) -> Result<JobStatus, ApiError> {
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or(JobStatus {
            status: JobState::Running,
            progress: 50,
            message: "still running".into(),
            error: None,
        }))
    }

    async fn fetch_results(&self, _job_id: &str) -> Result<ResultSet, ApiError> {
        Ok(self.results.clone())
    }

    async fn request_export(
        &self,
        _job_id: &str,
        format: ExportFormat,
    ) -> Result<String, ApiError> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.export_delay).await;
        Ok(format!("/api/download/out.{format}"))
    }

    async fn cancel_job(&self, _job_id: &str) -> Result<(), ApiError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config() -> SearchConfig {
    SearchConfig {
        base_url: "http://localhost:8000".into(),
        poll_interval: Duration::from_millis(10),
        request_timeout: Duration::from_secs(1),
        user_agent: "mapsearch-cli/test".into(),
    }
}

fn request() -> SearchRequest {
    SearchRequest {
        city: "São Paulo".into(),
        query: "pizzarias".into(),
        limit: 20,
    }
}

fn done_status() -> JobStatus {
    JobStatus {
        status: JobState::Done,
        progress: 100,
        message: "finished".into(),
        error: None,
    }
}

fn one_row_set() -> ResultSet {
    ResultSet {
        results: vec![ResultRow {
            name: "Pizzaria Bella".into(),
            address: None,
            phone: None,
            delivery: None,
            website: None,
            maps_url: None,
        }],
        total: 1,
    }
}

/// Apply incoming events to the session until the predicate holds.
async fn drive_until(
    rx: &mut UnboundedReceiver<JobEvent>,
    session: &mut SearchSession,
    what: &str,
    pred: impl Fn(&SearchSession) -> bool,
) {
    while !pred(session) {
        let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .expect("event channel closed");
        session.apply(&ev);
    }
}

fn exportable(generation: u64) -> impl Fn(&SearchSession) -> bool {
    move |s: &SearchSession| {
        s.generation() == generation && !s.is_submitting() && s.can_export()
    }
}

#[tokio::test]
async fn pending_export_suppresses_a_second_request() {
    let backend = StubBackend::new(vec![done_status()], one_row_set());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let controller = tokio::spawn(run_controller(
        test_config(),
        backend.clone(),
        event_tx,
        cmd_rx,
    ));

    cmd_tx.send(UiCommand::Submit(request())).unwrap();
    let mut session = SearchSession::new();
    drive_until(&mut event_rx, &mut session, "job to settle", exportable(1)).await;

    let job = session.job().unwrap().clone();
    cmd_tx
        .send(UiCommand::Export {
            job: job.clone(),
            format: ExportFormat::Csv,
        })
        .unwrap();
    // Second trigger lands while the first export is still in flight.
    cmd_tx
        .send(UiCommand::Export {
            job,
            format: ExportFormat::Xlsx,
        })
        .unwrap();

    drive_until(&mut event_rx, &mut session, "export to finish", |s| {
        s.artifact().is_some()
    })
    .await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(backend.exports.load(Ordering::SeqCst), 1);
    assert_eq!(
        session.artifact().unwrap().download_url,
        "http://localhost:8000/api/download/out.csv"
    );

    cmd_tx.send(UiCommand::Quit).unwrap();
    controller.await.unwrap().unwrap();
}

#[tokio::test]
async fn export_for_a_superseded_job_is_dropped() {
    let backend = StubBackend::new(vec![done_status(), done_status()], one_row_set());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let controller = tokio::spawn(run_controller(
        test_config(),
        backend.clone(),
        event_tx,
        cmd_rx,
    ));

    cmd_tx.send(UiCommand::Submit(request())).unwrap();
    let mut session = SearchSession::new();
    drive_until(&mut event_rx, &mut session, "first job", exportable(1)).await;
    let stale_job = session.job().unwrap().clone();

    cmd_tx.send(UiCommand::Submit(request())).unwrap();
    drive_until(&mut event_rx, &mut session, "second job", exportable(2)).await;

    cmd_tx
        .send(UiCommand::Export {
            job: stale_job,
            format: ExportFormat::Csv,
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.exports.load(Ordering::SeqCst), 0);

    cmd_tx.send(UiCommand::Quit).unwrap();
    controller.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancel_is_routed_only_to_the_active_generation() {
    // Empty script: the job polls `running` until the controller is torn down.
    let backend = StubBackend::new(Vec::new(), ResultSet::default());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let controller = tokio::spawn(run_controller(
        test_config(),
        backend.clone(),
        event_tx,
        cmd_rx,
    ));

    cmd_tx.send(UiCommand::Submit(request())).unwrap();
    let mut session = SearchSession::new();
    drive_until(&mut event_rx, &mut session, "job id", |s| s.job().is_some()).await;

    cmd_tx
        .send(UiCommand::Cancel {
            job: JobHandle {
                generation: 99,
                job_id: "job-ghost".into(),
            },
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.cancels.load(Ordering::SeqCst), 0);

    cmd_tx
        .send(UiCommand::Cancel {
            job: session.job().unwrap().clone(),
        })
        .unwrap();
    let mut waited = Duration::ZERO;
    while backend.cancels.load(Ordering::SeqCst) == 0 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert_eq!(backend.cancels.load(Ordering::SeqCst), 1);

    cmd_tx.send(UiCommand::Quit).unwrap();
    controller.await.unwrap().unwrap();
}

//! Bulk status tool.
//!
//! Mounting starts a status job for every path of the site and polls the job
//! until it completes or is stopped, then renders the per-resource results.
//!
//! Each `BulkStatusTool` owns at most one active poll. The poll is a spawned
//! task driven by a `PollHandle`; the handle is cancelled on `unmount` and the
//! task is aborted if the handle is dropped.

use chrono::TimeZone;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::admin_api::{AdminApi, AdminError};
use crate::admin_panel::AdminTool;
use crate::context::SiteContext;
use crate::datetime::{format_local, parse_datetime};
use crate::job::{JobState, Resource};
use crate::pane::{Cell, Fragment, Inline, SharedPane, Table};

pub const MODULE: &str = "bulk-status";

/// Class added to the pane once results are rendered.
pub const DONE_CLASS: &str = "results-done";

const RESULT_COLUMNS: &[&str] = &["Path", "Preview", "Published"];

// ---------------------------------------------------------------------------
// Poll state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// Waiting on the job; `attempts` status checks made so far
    Polling { attempts: u32 },
    /// Results rendered
    Done { rows: usize },
    /// A status or details request failed; polling stopped
    Failed(String),
    Cancelled,
}

impl PollState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, PollState::Polling { .. })
    }
}

/// Controller for one running poll.
pub struct PollHandle {
    state: watch::Receiver<PollState>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished() || self.state.borrow().is_finished()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Ask the poll to stop. No further requests are issued once the task
    /// observes the signal.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the poll to reach a final state.
    pub async fn wait(&self) -> PollState {
        wait_finished(self.subscribe()).await
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn wait_finished(mut rx: watch::Receiver<PollState>) -> PollState {
    match rx.wait_for(PollState::is_finished).await {
        Ok(state) => state.clone(),
        // Task went away without reporting (aborted)
        Err(_) => PollState::Cancelled,
    }
}

/// Start polling `job_url`. The first status check happens one `period`
/// after the call, then every `period` until the job is terminal.
pub fn start_polling<A: AdminApi>(
    api: Arc<A>,
    job_url: String,
    pane: SharedPane,
    period: Duration,
) -> PollHandle {
    let (state_tx, state_rx) = watch::channel(PollState::Polling { attempts: 0 });
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = tokio::spawn(run_poll(api, job_url, pane, period, state_tx, cancel_rx));
    PollHandle {
        state: state_rx,
        cancel: Some(cancel_tx),
        task,
    }
}

async fn run_poll<A: AdminApi>(
    api: Arc<A>,
    job_url: String,
    pane: SharedPane,
    period: Duration,
    state_tx: watch::Sender<PollState>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts = 0u32;

    let outcome = loop {
        tokio::select! {
            _ = &mut cancel_rx => break PollState::Cancelled,
            _ = ticker.tick() => {}
        }

        attempts += 1;
        let status = tokio::select! {
            _ = &mut cancel_rx => break PollState::Cancelled,
            status = api.job_status(&job_url) => status,
        };
        let status = match status {
            Ok(status) => status,
            Err(e) => break fail(&pane, &job_url, "status check", e),
        };

        if let Some(progress) = &status.progress {
            tracing::debug!(
                job = %job_url,
                attempts,
                state = %status.state,
                processed = progress.processed,
                total = progress.total,
                "job status"
            );
        } else {
            tracing::debug!(job = %job_url, attempts, state = %status.state, "job status");
        }

        if !status.state.is_terminal() {
            state_tx.send_replace(PollState::Polling { attempts });
            continue;
        }

        let details = tokio::select! {
            _ = &mut cancel_rx => break PollState::Cancelled,
            details = api.job_details(&status.links.self_url) => details,
        };
        match details {
            Ok(details) => {
                let table = results_table(&details.data.resources, &chrono::Local);
                let rows = table.rows.len();
                {
                    let mut pane = pane.lock();
                    pane.clear();
                    pane.add_class(DONE_CLASS);
                    pane.append(Fragment::Table(table));
                }
                tracing::info!(job = %job_url, attempts, rows, state = %status.state, "bulk status finished");
                break PollState::Done { rows };
            }
            Err(e) => break fail(&pane, &job_url, "details fetch", e),
        }
    };

    state_tx.send_replace(outcome);
}

fn fail(pane: &SharedPane, job_url: &str, what: &str, e: AdminError) -> PollState {
    tracing::error!(job = %job_url, "bulk status {what} failed: {e}");
    let message = format!("Bulk status {what} failed: {e}");
    let mut pane = pane.lock();
    pane.retain(|f| !matches!(f, Fragment::Progress));
    pane.append(Fragment::error_message(vec![Inline::Text(message.clone())]));
    PollState::Failed(message)
}

// ---------------------------------------------------------------------------
// Results rendering
// ---------------------------------------------------------------------------

/// Render one resource value as text: objects and arrays as JSON, date
/// strings in `tz`, anything else as its plain string form.
///
/// Only the ISO 8601 shapes `parse_datetime` accepts count as dates; other
/// date-like text such as `Oct 16 2026` is shown verbatim.
pub(crate) fn display_cell<Tz: TimeZone>(value: &Value, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match value {
        Value::Object(_) | Value::Array(_) => value.to_string(),
        Value::String(s) => match parse_datetime(s) {
            Some(dt) => format_local(&dt.with_timezone(tz)),
            None => s.clone(),
        },
        other => other.to_string(),
    }
}

/// One row per resource, one cell per field in the order the service sent.
pub fn results_table<Tz: TimeZone>(resources: &[Resource], tz: &Tz) -> Table
where
    Tz::Offset: std::fmt::Display,
{
    let mut table = Table::new(RESULT_COLUMNS);
    table.class = Some("admin-results".to_string());
    table.rows = resources
        .iter()
        .map(|resource| {
            resource
                .values()
                .map(|v| Cell::text(display_cell(v, tz)))
                .collect()
        })
        .collect();
    table
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum MountOutcome {
    /// A poll owned by this tool is still running; nothing was started
    AlreadyPolling,
    /// The new job did not report `created`, so it is not polled
    NotCreated(JobState),
    /// `unmount` arrived while the job was being started; nothing polls it
    Cancelled,
    Polling,
}

enum Slot {
    Idle,
    /// Job start request in flight; `cancelled` once unmounted meanwhile
    Starting { cancelled: bool },
    Polling(PollHandle),
}

/// Resets a `Starting` slot if mount is abandoned before it hands over.
struct StartGuard<'a> {
    slot: &'a Mutex<Slot>,
    armed: bool,
}

impl StartGuard<'_> {
    /// Hand the slot back to the caller, who must already hold its lock.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.lock() = Slot::Idle;
        }
    }
}

pub struct BulkStatusTool<A: AdminApi> {
    api: Arc<A>,
    poll_interval: Duration,
    slot: Mutex<Slot>,
}

impl<A: AdminApi> BulkStatusTool<A> {
    pub fn new(api: Arc<A>, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval,
            slot: Mutex::new(Slot::Idle),
        }
    }

    /// Start a status job for `site` and poll it into `pane`.
    ///
    /// Mounting again while a start is in flight never issues a second
    /// request. If that start had been unmounted, the new mount takes it over.
    pub async fn mount(
        &self,
        pane: SharedPane,
        site: &SiteContext,
    ) -> Result<MountOutcome, AdminError> {
        let guard = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Starting { cancelled } => {
                    *cancelled = false;
                    return Ok(MountOutcome::AlreadyPolling);
                }
                Slot::Polling(handle) if !handle.is_finished() => {
                    return Ok(MountOutcome::AlreadyPolling);
                }
                _ => {}
            }
            *slot = Slot::Starting { cancelled: false };
            StartGuard { slot: &self.slot, armed: true }
        };

        pane.lock().remove_class(DONE_CLASS);
        let start = self.api.start_status_job(site).await?;

        let mut slot = self.slot.lock();
        guard.disarm();
        if matches!(*slot, Slot::Starting { cancelled: true }) {
            *slot = Slot::Idle;
            tracing::info!(%site, job = %start.links.self_url, "unmounted while starting; job not polled");
            return Ok(MountOutcome::Cancelled);
        }

        pane.lock().append(Fragment::Progress);

        if start.job.state != JobState::Created {
            // Neither polled nor fetched; the progress indicator stays.
            tracing::warn!(%site, state = %start.job.state, "status job not in created state; not polling");
            *slot = Slot::Idle;
            return Ok(MountOutcome::NotCreated(start.job.state));
        }

        tracing::info!(%site, job = %start.links.self_url, "polling bulk status job");
        let handle = start_polling(
            self.api.clone(),
            start.links.self_url,
            pane,
            self.poll_interval,
        );
        *slot = Slot::Polling(handle);
        Ok(MountOutcome::Polling)
    }

    /// Cancel the active poll, if any. A job start still in flight is marked
    /// so that it is never polled.
    pub fn unmount(&self) {
        let mut slot = self.slot.lock();
        if let Slot::Starting { cancelled } = &mut *slot {
            tracing::debug!("unmounted while bulk status job is starting");
            *cancelled = true;
            return;
        }
        if let Slot::Polling(mut handle) = std::mem::replace(&mut *slot, Slot::Idle) {
            if !handle.is_finished() {
                tracing::debug!("cancelling bulk status poll");
            }
            handle.cancel();
        }
    }

    pub fn poll_state(&self) -> Option<PollState> {
        match &*self.slot.lock() {
            Slot::Polling(handle) => Some(handle.state()),
            _ => None,
        }
    }

    /// Wait for the active poll to finish. `None` when nothing is polling.
    pub async fn wait(&self) -> Option<PollState> {
        let rx = match &*self.slot.lock() {
            Slot::Polling(handle) => handle.subscribe(),
            _ => return None,
        };
        Some(wait_finished(rx).await)
    }
}

impl<A: AdminApi> AdminTool for BulkStatusTool<A> {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn render<'a>(
        &'a self,
        pane: SharedPane,
        _data: &'a Value,
        _query: Option<&'a str>,
        ctx: &'a SiteContext,
    ) -> BoxFuture<'a, Result<(), AdminError>> {
        Box::pin(async move {
            let outcome = self.mount(pane, ctx).await?;
            tracing::debug!(?outcome, "bulk status mounted");
            Ok(())
        })
    }

    fn unmount(&self) {
        BulkStatusTool::unmount(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobDetails, JobInfo, JobLinks, JobStart, JobStatus};
    use crate::log_viewer::{LogEntry, LogRange};
    use crate::pane::shared_pane;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    const PERIOD: Duration = Duration::from_millis(2000);

    /// Scripted job service. Status checks pop states from `script`; the
    /// last state repeats once the script runs out.
    struct FakeJobs {
        start_state: JobState,
        /// Latency of the job start request
        start_delay: Duration,
        script: Mutex<VecDeque<Result<JobState, AdminError>>>,
        last: Mutex<JobState>,
        details: Result<JobDetails, AdminError>,
        starts: AtomicU32,
        status_calls: AtomicU32,
        details_calls: AtomicU32,
        details_urls: Mutex<Vec<String>>,
    }

    impl FakeJobs {
        fn new(script: Vec<Result<JobState, AdminError>>, details: Value) -> Arc<Self> {
            Arc::new(Self {
                start_state: JobState::Created,
                start_delay: Duration::ZERO,
                script: Mutex::new(script.into()),
                last: Mutex::new(JobState::Running("running".into())),
                details: Ok(serde_json::from_value(details).unwrap()),
                starts: AtomicU32::new(0),
                status_calls: AtomicU32::new(0),
                details_calls: AtomicU32::new(0),
                details_urls: Mutex::new(Vec::new()),
            })
        }

        fn running_forever() -> Arc<Self> {
            Self::new(Vec::new(), json!({}))
        }

        fn counts(&self) -> (u32, u32, u32) {
            (
                self.starts.load(Ordering::SeqCst),
                self.status_calls.load(Ordering::SeqCst),
                self.details_calls.load(Ordering::SeqCst),
            )
        }
    }

    fn running() -> Result<JobState, AdminError> {
        Ok(JobState::Running("running".into()))
    }

    impl AdminApi for FakeJobs {
        async fn start_status_job(&self, _site: &SiteContext) -> Result<JobStart, AdminError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if !self.start_delay.is_zero() {
                tokio::time::sleep(self.start_delay).await;
            }
            Ok(JobStart {
                job: JobInfo { state: self.start_state.clone(), name: None, topic: None },
                links: JobLinks { self_url: "/job/1".into() },
            })
        }

        async fn job_status(&self, job_url: &str) -> Result<JobStatus, AdminError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            let state = match next {
                Some(Ok(state)) => {
                    *self.last.lock() = state.clone();
                    state
                }
                Some(Err(e)) => return Err(e),
                None => self.last.lock().clone(),
            };
            Ok(JobStatus {
                state,
                links: JobLinks { self_url: job_url.to_string() },
                progress: None,
            })
        }

        async fn job_details(&self, job_url: &str) -> Result<JobDetails, AdminError> {
            self.details_calls.fetch_add(1, Ordering::SeqCst);
            self.details_urls.lock().push(job_url.to_string());
            self.details.clone()
        }

        async fn fetch_logs(
            &self,
            _site: &SiteContext,
            _range: &LogRange,
        ) -> Result<Vec<LogEntry>, AdminError> {
            unreachable!("bulk status never queries logs")
        }

        fn login_url(&self) -> String {
            String::new()
        }
    }

    fn site() -> SiteContext {
        SiteContext::new("adobe", "site", "main")
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_nth_poll_and_renders_results() {
        let api = FakeJobs::new(
            vec![running(), running(), Ok(JobState::Completed)],
            json!({"data": {"resources": [{"path": "/a", "preview": "P", "live": "L"}]}}),
        );
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        let pane = shared_pane();

        let outcome = tool.mount(pane.clone(), &site()).await.unwrap();
        assert_eq!(outcome, MountOutcome::Polling);

        let state = tool.wait().await.unwrap();
        assert_eq!(state, PollState::Done { rows: 1 });
        assert_eq!(api.counts(), (1, 3, 1));
        assert_eq!(*api.details_urls.lock(), ["/job/1"]);

        {
            let pane = pane.lock();
            assert!(pane.has_class(DONE_CLASS));
            let tables: Vec<&Table> = pane.tables().collect();
            assert_eq!(tables.len(), 1);
            assert_eq!(tables[0].headers, ["Path", "Preview", "Published"]);
            assert_eq!(tables[0].rows.len(), 1);
            let cells: Vec<&str> = tables[0].rows[0].iter().map(Cell::display).collect();
            assert_eq!(cells, ["/a", "P", "L"]);
            // Progress indicator replaced by the results
            assert_eq!(pane.fragments().len(), 1);
        }

        // No further status checks once done
        tokio::time::sleep(PERIOD * 10).await;
        assert_eq!(api.counts(), (1, 3, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_waits_one_interval() {
        let api = FakeJobs::running_forever();
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        tool.mount(shared_pane(), &site()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(api.counts().1, 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(api.counts().1, 1);
        tokio::time::sleep(PERIOD).await;
        assert_eq!(api.counts().1, 2);
        assert_eq!(tool.poll_state(), Some(PollState::Polling { attempts: 2 }));
        tool.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn second_mount_while_polling_is_a_no_op() {
        let api = FakeJobs::running_forever();
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        let pane = shared_pane();

        assert_eq!(tool.mount(pane.clone(), &site()).await.unwrap(), MountOutcome::Polling);
        for _ in 0..3 {
            assert_eq!(
                tool.mount(pane.clone(), &site()).await.unwrap(),
                MountOutcome::AlreadyPolling
            );
        }
        tokio::time::sleep(PERIOD * 3 + Duration::from_millis(1)).await;

        // One job, one timer: three ticks, not twelve
        assert_eq!(api.counts(), (1, 3, 0));
        assert_eq!(
            pane.lock().fragments().iter().filter(|f| **f == Fragment::Progress).count(),
            1
        );
        tool.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_mounts_start_a_single_job() {
        let api = FakeJobs::running_forever();
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        let pane = shared_pane();

        let s = site();
        let (a, b) = tokio::join!(tool.mount(pane.clone(), &s), tool.mount(pane.clone(), &s));
        let mut outcomes = [a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| matches!(o, MountOutcome::Polling));
        assert_eq!(outcomes, [MountOutcome::AlreadyPolling, MountOutcome::Polling]);
        assert_eq!(api.counts().0, 1);
        tool.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn can_mount_again_after_completion() {
        let api = FakeJobs::new(vec![Ok(JobState::Stopped)], json!({"data": {"resources": []}}));
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        let pane = shared_pane();

        tool.mount(pane.clone(), &site()).await.unwrap();
        assert_eq!(tool.wait().await, Some(PollState::Done { rows: 0 }));
        assert!(pane.lock().has_class(DONE_CLASS));

        // Remount clears the done marker and starts a fresh job
        assert_eq!(tool.mount(pane.clone(), &site()).await.unwrap(), MountOutcome::Polling);
        assert!(!pane.lock().has_class(DONE_CLASS));
        assert_eq!(api.counts().0, 2);
        tool.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn job_not_created_is_not_polled() {
        let api = Arc::new(FakeJobs {
            start_state: JobState::Running("running".into()),
            ..Arc::into_inner(FakeJobs::running_forever()).unwrap()
        });
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        let pane = shared_pane();

        let outcome = tool.mount(pane.clone(), &site()).await.unwrap();
        assert_eq!(outcome, MountOutcome::NotCreated(JobState::Running("running".into())));
        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(api.counts(), (1, 0, 0));
        assert_eq!(tool.poll_state(), None);
        assert_eq!(pane.lock().fragments(), [Fragment::Progress]);

        // Slot was released, so another mount starts another job
        tool.mount(pane, &site()).await.unwrap();
        assert_eq!(api.counts().0, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_stops_polling() {
        let api = FakeJobs::running_forever();
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        tool.mount(shared_pane(), &site()).await.unwrap();

        tokio::time::sleep(PERIOD * 2 + Duration::from_millis(1)).await;
        assert_eq!(api.counts().1, 2);

        tool.unmount();
        tokio::time::sleep(PERIOD * 10).await;
        assert_eq!(api.counts().1, 2);
        assert_eq!(tool.poll_state(), None);
    }

    fn slow_start() -> Arc<FakeJobs> {
        Arc::new(FakeJobs {
            start_delay: Duration::from_secs(1),
            ..Arc::into_inner(FakeJobs::running_forever()).unwrap()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_during_job_start_prevents_polling() {
        let api = slow_start();
        let tool = Arc::new(BulkStatusTool::new(api.clone(), PERIOD));
        let pane = shared_pane();
        let mounting = tokio::spawn({
            let tool = tool.clone();
            let pane = pane.clone();
            async move {
                let s = site();
                tool.mount(pane, &s).await
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tool.unmount();
        assert_eq!(mounting.await.unwrap().unwrap(), MountOutcome::Cancelled);

        tokio::time::sleep(PERIOD * 10).await;
        assert_eq!(api.counts(), (1, 0, 0));
        assert_eq!(tool.poll_state(), None);
        assert!(pane.lock().fragments().is_empty());

        // Slot is free again
        assert_eq!(tool.mount(shared_pane(), &site()).await.unwrap(), MountOutcome::Polling);
        assert_eq!(api.counts().0, 2);
        tool.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn remount_during_cancelled_start_reuses_the_job() {
        let api = slow_start();
        let tool = Arc::new(BulkStatusTool::new(api.clone(), PERIOD));
        let first = tokio::spawn({
            let tool = tool.clone();
            async move {
                let s = site();
                tool.mount(shared_pane(), &s).await
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tool.unmount();
        let second = tool.mount(shared_pane(), &site()).await.unwrap();
        assert_eq!(second, MountOutcome::AlreadyPolling);
        assert_eq!(first.await.unwrap().unwrap(), MountOutcome::Polling);

        // One job, and it is polled
        tokio::time::sleep(PERIOD + Duration::from_millis(1)).await;
        assert_eq!(api.counts(), (1, 1, 0));
        tool.unmount();
        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(api.counts(), (1, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reports_cancelled_state() {
        let api = FakeJobs::running_forever();
        let mut handle = start_polling(api.clone(), "/job/1".into(), shared_pane(), PERIOD);
        tokio::time::sleep(PERIOD + Duration::from_millis(1)).await;
        handle.cancel();
        assert_eq!(handle.wait().await, PollState::Cancelled);
        assert!(handle.is_finished());
        assert_eq!(api.counts().1, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_failure_stops_polling_and_shows_error() {
        let api = FakeJobs::new(
            vec![running(), Err(AdminError::Network("connection reset".into()))],
            json!({}),
        );
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        let pane = shared_pane();
        tool.mount(pane.clone(), &site()).await.unwrap();

        let state = tool.wait().await.unwrap();
        let PollState::Failed(msg) = &state else { panic!("expected failure, got {state:?}") };
        assert!(msg.contains("connection reset"));

        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(api.counts(), (1, 2, 0));

        let pane = pane.lock();
        assert!(!pane.has_class(DONE_CLASS));
        assert_eq!(pane.messages().count(), 1);
        assert!(!pane.fragments().contains(&Fragment::Progress));
    }

    #[tokio::test(start_paused = true)]
    async fn details_failure_is_reported() {
        let api = Arc::new(FakeJobs {
            details: Err(AdminError::Http { status: 404, body: String::new() }),
            ..Arc::into_inner(FakeJobs::new(vec![Ok(JobState::Completed)], json!({}))).unwrap()
        });
        let tool = BulkStatusTool::new(api.clone(), PERIOD);
        tool.mount(shared_pane(), &site()).await.unwrap();

        let state = tool.wait().await.unwrap();
        assert!(matches!(state, PollState::Failed(ref m) if m.contains("details")));
        assert_eq!(api.counts(), (1, 1, 1));
    }

    #[tokio::test]
    async fn start_failure_releases_the_slot() {
        struct Down;
        impl AdminApi for Down {
            async fn start_status_job(&self, _: &SiteContext) -> Result<JobStart, AdminError> {
                Err(AdminError::Unauthorized)
            }
            async fn job_status(&self, _: &str) -> Result<JobStatus, AdminError> {
                unreachable!()
            }
            async fn job_details(&self, _: &str) -> Result<JobDetails, AdminError> {
                unreachable!()
            }
            async fn fetch_logs(&self, _: &SiteContext, _: &LogRange) -> Result<Vec<LogEntry>, AdminError> {
                unreachable!()
            }
            fn login_url(&self) -> String {
                String::new()
            }
        }

        let tool = BulkStatusTool::new(Arc::new(Down), PERIOD);
        let err = tool.mount(shared_pane(), &site()).await.unwrap_err();
        assert_eq!(err, AdminError::Unauthorized);
        // Not stuck in Starting
        let err = tool.mount(shared_pane(), &site()).await.unwrap_err();
        assert_eq!(err, AdminError::Unauthorized);
    }

    #[test]
    fn display_cell_formats_like_the_results_table_expects() {
        assert_eq!(display_cell(&json!("/a"), &Utc), "/a");
        assert_eq!(display_cell(&json!(200), &Utc), "200");
        assert_eq!(display_cell(&json!(null), &Utc), "null");
        assert_eq!(display_cell(&json!(true), &Utc), "true");
        assert_eq!(display_cell(&json!({"status": 404}), &Utc), r#"{"status":404}"#);
        assert_eq!(display_cell(&json!(["a"]), &Utc), r#"["a"]"#);
        assert_eq!(
            display_cell(&json!("2026-10-16T08:05:09Z"), &Utc),
            "10/16/2026, 8:05:09 AM"
        );
        assert_eq!(display_cell(&json!("Oct 16 2026"), &Utc), "Oct 16 2026");
        assert_eq!(display_cell(&json!("Fri, 16 Oct 2026 08:05:09 GMT"), &Utc), "Fri, 16 Oct 2026 08:05:09 GMT");
    }

    #[test]
    fn results_table_follows_resource_key_order() {
        let details: JobDetails = serde_json::from_value(json!({"data": {"resources": [
            {"path": "/a", "preview": 200, "live": 404},
            {"path": "/b", "preview": 200, "live": 200}
        ]}}))
        .unwrap();
        let table = results_table(&details.data.resources, &Utc);
        assert_eq!(table.class.as_deref(), Some("admin-results"));
        let rows: Vec<Vec<&str>> = table
            .rows
            .iter()
            .map(|r| r.iter().map(Cell::display).collect())
            .collect();
        assert_eq!(rows, [["/a", "200", "404"], ["/b", "200", "200"]]);
    }
}

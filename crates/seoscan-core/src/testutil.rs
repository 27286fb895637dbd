//! Test utilities: in-memory implementations of all core traits.
//!
//! Handwritten fakes for dependency injection in unit tests.
//! All fakes use `Arc<Mutex<_>>` for interior mutability, so clones share
//! state and tests can assert on recorded calls.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use url::Url;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{PageJob, QueuedJob};
use crate::job_queue::{JobQueue, StaleJobs};
use crate::models::{
    BeginOutcome, ClaimOutcome, DuplicateGroup, Observation, ObservationKind, PageCounts,
    PageReport, PageStatus, Scan, ScanStatus,
};
use crate::traits::{Fetcher, FrontierStore, LinkExtractor, PageAnalyzer};
use crate::worker::{JobHandler, JobOutcome, WorkerEvent, WorkerReporter};

/// `AppError` is not `Clone` (it wraps `serde_json::Error`); rebuild it.
pub fn clone_error(error: &AppError) -> AppError {
    match error {
        AppError::HttpError(s) => AppError::HttpError(s.clone()),
        AppError::Timeout(secs) => AppError::Timeout(*secs),
        AppError::NetworkError(s) => AppError::NetworkError(s.clone()),
        AppError::ContentError(s) => AppError::ContentError(s.clone()),
        AppError::InvalidUrl(s) => AppError::InvalidUrl(s.clone()),
        AppError::DatabaseError(s) => AppError::DatabaseError(s.clone()),
        AppError::NotFound(s) => AppError::NotFound(s.clone()),
        AppError::ConfigError(s) => AppError::ConfigError(s.clone()),
        AppError::SerializationError(e) => AppError::Generic(e.to_string()),
        AppError::Generic(s) => AppError::Generic(s.clone()),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Fetcher serving canned pages by URL.
///
/// Queued `responses` take priority over `pages`; unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<HashMap<String, String>>,
    responses: Arc<Mutex<VecDeque<Result<String, AppError>>>>,
    error: Option<Arc<AppError>>,
    broken: Vec<String>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn with_pages(pages: Vec<(&str, &str)>) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .into_iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Every fetch fails with `error`.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Some(Arc::new(error)),
            ..Self::default()
        }
    }

    /// Each fetch pops the next response.
    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Self::default()
        }
    }

    /// Make reachability checks of `url` fail.
    pub fn with_broken(mut self, url: &str) -> Self {
        self.broken.push(url.to_string());
        self
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        if let Some(error) = &self.error {
            return Err(clone_error(error));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::HttpError(format!("HTTP 404 Not Found for {url}")))
    }

    async fn probe(&self, url: &str) -> Result<(), AppError> {
        if self.broken.iter().any(|b| b == url) {
            Err(AppError::HttpError(format!("HTTP 404 Not Found for {url}")))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// MockLinkExtractor / MockAnalyzer
// ---------------------------------------------------------------------------

/// Treats every whitespace-separated `http(s)://` token in the body as a link.
#[derive(Clone, Default)]
pub struct MockLinkExtractor;

impl MockLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for MockLinkExtractor {
    fn extract(&self, html: &str, _page_url: &Url) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        for token in html.split_whitespace() {
            if (token.starts_with("http://") || token.starts_with("https://"))
                && !links.iter().any(|l| l == token)
            {
                links.push(token.to_string());
            }
        }
        links
    }
}

/// Returns the same report for every page.
#[derive(Clone, Default)]
pub struct MockAnalyzer {
    report: PageReport,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(report: PageReport) -> Self {
        Self { report }
    }
}

impl PageAnalyzer for MockAnalyzer {
    fn analyze(&self, _html: &str, _page_url: &Url) -> PageReport {
        self.report.clone()
    }
}

// ---------------------------------------------------------------------------
// MemoryFrontier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryPage {
    scan_id: Uuid,
    url: String,
    status: PageStatus,
    lease: Option<Uuid>,
    discovered_by: Option<Uuid>,
    enqueued: bool,
    title: Option<String>,
    description: Option<String>,
    /// Every status the page has been in, in order.
    history: Vec<PageStatus>,
}

impl MemoryPage {
    /// Apply a status change, refusing anything outside the page lifecycle.
    fn advance(&mut self, next: PageStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::DatabaseError(format!(
                "invalid page transition {} -> {next}",
                self.status
            )));
        }
        self.status = next;
        self.history.push(next);
        Ok(())
    }
}

#[derive(Default)]
struct FrontierState {
    scans: HashMap<Uuid, Scan>,
    pages: HashMap<Uuid, MemoryPage>,
    observations: Vec<Observation>,
}

impl FrontierState {
    fn find_page(&self, scan_id: Uuid, url: &str) -> Option<(Uuid, &MemoryPage)> {
        self.pages
            .iter()
            .find(|(_, p)| p.scan_id == scan_id && p.url == url)
            .map(|(id, p)| (*id, p))
    }

    fn insert_page(&mut self, scan_id: Uuid, url: &str, discovered_by: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.pages.insert(
            id,
            MemoryPage {
                scan_id,
                url: url.to_string(),
                status: PageStatus::Pending,
                lease: None,
                discovered_by,
                enqueued: false,
                title: None,
                description: None,
                history: vec![PageStatus::Pending],
            },
        );
        id
    }
}

/// In-memory frontier with the same guarded transitions as the SQL store.
#[derive(Clone, Default)]
pub struct MemoryFrontier {
    state: Arc<Mutex<FrontierState>>,
}

impl MemoryFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_status_by_url(&self, scan_id: Uuid, url: &str) -> Option<PageStatus> {
        let state = self.state.lock().unwrap();
        state.find_page(scan_id, url).map(|(_, p)| p.status)
    }

    pub fn page_history(&self, page_id: Uuid) -> Vec<PageStatus> {
        let state = self.state.lock().unwrap();
        state
            .pages
            .get(&page_id)
            .map(|p| p.history.clone())
            .unwrap_or_default()
    }

    pub fn page_ids(&self, scan_id: Uuid) -> Vec<Uuid> {
        let state = self.state.lock().unwrap();
        state
            .pages
            .iter()
            .filter(|(_, p)| p.scan_id == scan_id)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl FrontierStore for MemoryFrontier {
    async fn create_scan(&self, root_url: &str) -> Result<Scan, AppError> {
        let scan = Scan {
            id: Uuid::new_v4(),
            start_url: root_url.to_string(),
            status: ScanStatus::Starting,
            start_time: Utc::now(),
            end_time: None,
        };
        self.state
            .lock()
            .unwrap()
            .scans
            .insert(scan.id, scan.clone());
        Ok(scan)
    }

    async fn seed_page(&self, scan_id: Uuid, url: &str) -> Result<Uuid, AppError> {
        let mut state = self.state.lock().unwrap();
        if !state.scans.contains_key(&scan_id) {
            return Err(AppError::NotFound(format!("scan {scan_id}")));
        }
        if let Some((id, _)) = state.find_page(scan_id, url) {
            return Ok(id);
        }
        Ok(state.insert_page(scan_id, url, None))
    }

    async fn try_claim(
        &self,
        scan_id: Uuid,
        url: &str,
        claimant: Uuid,
    ) -> Result<ClaimOutcome, AppError> {
        let mut state = self.state.lock().unwrap();
        match state.find_page(scan_id, url) {
            Some((id, page))
                if page.status == PageStatus::Pending
                    && page.discovered_by == Some(claimant)
                    && !page.enqueued =>
            {
                Ok(ClaimOutcome::Claimed(id))
            }
            Some(_) => Ok(ClaimOutcome::AlreadyExists),
            None => Ok(ClaimOutcome::Claimed(state.insert_page(
                scan_id,
                url,
                Some(claimant),
            ))),
        }
    }

    async fn mark_enqueued(&self, page_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let page = state
            .pages
            .get_mut(&page_id)
            .ok_or_else(|| AppError::NotFound(format!("page {page_id}")))?;
        page.enqueued = true;
        Ok(())
    }

    async fn begin_processing(&self, page_id: Uuid, lease: Uuid) -> Result<BeginOutcome, AppError> {
        let mut state = self.state.lock().unwrap();
        let page = state
            .pages
            .get_mut(&page_id)
            .ok_or_else(|| AppError::NotFound(format!("page {page_id}")))?;
        match page.status {
            PageStatus::Processing if page.lease == Some(lease) => Ok(BeginOutcome::Resumed),
            status if status.can_transition_to(PageStatus::Processing) => {
                page.advance(PageStatus::Processing)?;
                page.lease = Some(lease);
                Ok(BeginOutcome::Started)
            }
            prior => Ok(BeginOutcome::RaceLost(prior)),
        }
    }

    async fn complete_page(
        &self,
        page_id: Uuid,
        lease: Uuid,
        report: &PageReport,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let Some(page) = state.pages.get_mut(&page_id) else {
            return Ok(false);
        };
        if page.status != PageStatus::Processing || page.lease != Some(lease) {
            return Ok(false);
        }
        page.advance(PageStatus::Completed)?;
        page.title = Some(report.title.clone());
        page.description = Some(report.description.clone());
        let url = page.url.clone();
        for observation in &report.observations {
            state.observations.push(Observation {
                id: Uuid::new_v4(),
                page_id,
                url: url.clone(),
                kind: observation.kind.as_str().to_string(),
                message: observation.message.clone(),
            });
        }
        Ok(true)
    }

    async fn fail_page(&self, page_id: Uuid, lease: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let Some(page) = state.pages.get_mut(&page_id) else {
            return Ok(false);
        };
        if page.status != PageStatus::Processing || page.lease != Some(lease) {
            return Ok(false);
        }
        page.advance(PageStatus::Failed)?;
        Ok(true)
    }

    async fn pending_count(&self, scan_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pages
            .values()
            .filter(|p| p.scan_id == scan_id && !p.status.is_terminal())
            .count() as i64)
    }

    async fn mark_scan_running(&self, scan_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let scan = state
            .scans
            .get_mut(&scan_id)
            .ok_or_else(|| AppError::NotFound(format!("scan {scan_id}")))?;
        if scan.status.can_transition_to(ScanStatus::Running) {
            scan.status = ScanStatus::Running;
        }
        Ok(())
    }

    async fn mark_scan_completed(&self, scan_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let unfinished = state
            .pages
            .values()
            .any(|p| p.scan_id == scan_id && !p.status.is_terminal());
        if unfinished {
            return Ok(false);
        }
        match state.scans.get_mut(&scan_id) {
            Some(scan) if scan.status.can_transition_to(ScanStatus::Completed) => {
                scan.status = ScanStatus::Completed;
                scan.end_time = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_scan(&self, scan_id: Uuid) -> Result<Option<Scan>, AppError> {
        Ok(self.state.lock().unwrap().scans.get(&scan_id).cloned())
    }

    async fn list_scans(&self, limit: usize) -> Result<Vec<Scan>, AppError> {
        let state = self.state.lock().unwrap();
        let mut scans: Vec<Scan> = state.scans.values().cloned().collect();
        scans.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        scans.truncate(limit);
        Ok(scans)
    }

    async fn page_counts(&self, scan_id: Uuid) -> Result<PageCounts, AppError> {
        let state = self.state.lock().unwrap();
        let mut counts = PageCounts::default();
        for page in state.pages.values().filter(|p| p.scan_id == scan_id) {
            counts.total += 1;
            match page.status {
                PageStatus::Pending => counts.pending += 1,
                PageStatus::Processing => counts.processing += 1,
                PageStatus::Completed => counts.completed += 1,
                PageStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn scan_observations(&self, scan_id: Uuid) -> Result<Vec<Observation>, AppError> {
        let state = self.state.lock().unwrap();
        let mut observations: Vec<Observation> = state
            .observations
            .iter()
            .filter(|o| {
                state
                    .pages
                    .get(&o.page_id)
                    .is_some_and(|p| p.scan_id == scan_id)
            })
            .cloned()
            .collect();
        observations.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(observations)
    }

    async fn duplicate_metadata(&self, scan_id: Uuid) -> Result<Vec<DuplicateGroup>, AppError> {
        let state = self.state.lock().unwrap();
        let completed: Vec<&MemoryPage> = state
            .pages
            .values()
            .filter(|p| p.scan_id == scan_id && p.status == PageStatus::Completed)
            .collect();

        let mut groups = Vec::new();
        for kind in [ObservationKind::DuplicateTitle, ObservationKind::DuplicateDescription] {
            let mut by_value: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for page in &completed {
                let value = match kind {
                    ObservationKind::DuplicateTitle => page.title.as_deref(),
                    _ => page.description.as_deref(),
                };
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    by_value.entry(value).or_default().push(page.url.clone());
                }
            }
            for (value, mut urls) in by_value {
                if urls.len() > 1 {
                    urls.sort();
                    groups.push(DuplicateGroup {
                        kind,
                        value: value.to_string(),
                        urls,
                    });
                }
            }
        }
        Ok(groups)
    }
}

// ---------------------------------------------------------------------------
// MemoryJobQueue
// ---------------------------------------------------------------------------

/// Recorded retry or discard: (job_id, error_message).
pub type FailedJobRecord = (Uuid, String);

struct MemoryJob {
    /// `attempt` holds the number of claims so far.
    queued: QueuedJob,
    running: bool,
    run_at: DateTime<Utc>,
    locked_at: Option<DateTime<Utc>>,
}

/// FIFO job queue backed by an in-memory Vec.
#[derive(Clone, Default)]
pub struct MemoryJobQueue {
    jobs: Arc<Mutex<Vec<MemoryJob>>>,
    pub completed: Arc<Mutex<Vec<Uuid>>>,
    pub retried: Arc<Mutex<Vec<FailedJobRecord>>>,
    pub discarded: Arc<Mutex<Vec<FailedJobRecord>>>,
    pub released_workers: Arc<Mutex<Vec<String>>>,
    failing_enqueues: Arc<Mutex<Vec<String>>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the worker holding `job_id` stopped renewing its lock an hour ago.
    pub fn expire_lock(&self, job_id: Uuid) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.queued.id == job_id) {
            job.locked_at = Some(Utc::now() - TimeDelta::hours(1));
        }
    }

    /// Make the next `enqueue` of a job for `url` fail with a database error.
    pub fn fail_next_enqueue_of(&self, url: &str) {
        self.failing_enqueues.lock().unwrap().push(url.to_string());
    }

    /// URLs of jobs waiting to be claimed, in queue order.
    pub fn pending_urls(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| !j.running)
            .map(|j| j.queued.job.url.clone())
            .collect()
    }
}

impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: PageJob, max_attempts: u32) -> Result<Uuid, AppError> {
        {
            let mut failing = self.failing_enqueues.lock().unwrap();
            if let Some(pos) = failing.iter().position(|u| *u == job.url) {
                failing.remove(pos);
                return Err(AppError::DatabaseError("connection reset".into()));
            }
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.jobs.lock().unwrap().push(MemoryJob {
            queued: QueuedJob {
                id,
                job,
                attempt: 0,
                max_attempts: max_attempts.max(1),
                enqueued_at: now,
                worker_id: None,
            },
            running: false,
            run_at: now,
            locked_at: None,
        });
        Ok(id)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<QueuedJob>, AppError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.iter_mut().find(|j| !j.running && j.run_at <= now) else {
            return Ok(None);
        };
        job.running = true;
        job.locked_at = Some(now);
        job.queued.attempt += 1;
        job.queued.worker_id = Some(worker_id.to_string());
        Ok(Some(job.queued.clone()))
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), AppError> {
        self.jobs.lock().unwrap().retain(|j| j.queued.id != job_id);
        self.completed.lock().unwrap().push(job_id);
        Ok(())
    }

    async fn retry(&self, job_id: Uuid, error: &str, run_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.queued.id == job_id) {
            job.running = false;
            job.run_at = run_at;
            job.locked_at = None;
            job.queued.worker_id = None;
        }
        self.retried
            .lock()
            .unwrap()
            .push((job_id, error.to_string()));
        Ok(())
    }

    async fn discard(&self, job_id: Uuid, error: &str) -> Result<(), AppError> {
        self.jobs.lock().unwrap().retain(|j| j.queued.id != job_id);
        self.discarded
            .lock()
            .unwrap()
            .push((job_id, error.to_string()));
        Ok(())
    }

    async fn release_worker_jobs(&self, worker_id: &str) -> Result<u64, AppError> {
        self.released_workers
            .lock()
            .unwrap()
            .push(worker_id.to_string());
        let mut released = 0;
        let mut jobs = self.jobs.lock().unwrap();
        for job in jobs
            .iter_mut()
            .filter(|j| j.running && j.queued.worker_id.as_deref() == Some(worker_id))
        {
            job.running = false;
            job.locked_at = None;
            job.queued.worker_id = None;
            job.queued.attempt = job.queued.attempt.saturating_sub(1);
            released += 1;
        }
        Ok(released)
    }

    async fn requeue_stale(&self, lease_timeout: Duration) -> Result<StaleJobs, AppError> {
        let cutoff = Utc::now()
            - TimeDelta::from_std(lease_timeout).unwrap_or(TimeDelta::seconds(300));
        let mut stale = StaleJobs::default();
        let mut jobs = self.jobs.lock().unwrap();
        jobs.retain_mut(|job| {
            let expired = job.running && job.locked_at.is_some_and(|t| t < cutoff);
            if !expired {
                return true;
            }
            if job.queued.attempt >= job.queued.max_attempts {
                stale.exhausted.push(job.queued.clone());
                false
            } else {
                job.running = false;
                job.locked_at = None;
                job.queued.worker_id = None;
                stale.requeued += 1;
                true
            }
        });
        Ok(stale)
    }

    async fn outstanding(&self) -> Result<i64, AppError> {
        Ok(self.jobs.lock().unwrap().len() as i64)
    }
}

// ---------------------------------------------------------------------------
// MockHandler
// ---------------------------------------------------------------------------

/// Handler that replays scripted results and records what it saw.
#[derive(Clone, Default)]
pub struct MockHandler {
    results: Arc<Mutex<VecDeque<Result<JobOutcome, AppError>>>>,
    fail_url: Option<String>,
    delay: Option<Duration>,
    in_flight: Arc<Mutex<usize>>,
    pub handled: Arc<Mutex<Vec<QueuedJob>>>,
    pub exhausted_jobs: Arc<Mutex<Vec<QueuedJob>>>,
    pub max_in_flight: Arc<Mutex<usize>>,
}

impl MockHandler {
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Each call pops the next result; once empty, calls succeed.
    pub fn with_results(results: Vec<Result<JobOutcome, AppError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into())),
            ..Self::default()
        }
    }

    /// Fails every job for `url` with an HTTP error.
    pub fn failing_for(url: &str) -> Self {
        Self {
            fail_url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl JobHandler for MockHandler {
    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome, AppError> {
        self.handled.lock().unwrap().push(job.clone());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            *in_flight += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            *max = (*max).max(*in_flight);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        *self.in_flight.lock().unwrap() -= 1;

        if self.fail_url.as_deref() == Some(job.job.url.as_str()) {
            return Err(AppError::HttpError("HTTP 500 Internal Server Error".into()));
        }
        let scripted = self.results.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(JobOutcome::Processed {
            links_found: 0,
            links_enqueued: 0,
            observations: 0,
        }))
    }

    async fn exhausted(&self, job: &QueuedJob, _reason: &str) {
        self.exhausted_jobs.lock().unwrap().push(job.clone());
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Records the name of every worker event, in order.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerReporter for MockReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let name = match event {
            WorkerEvent::Started { .. } => "Started",
            WorkerEvent::Polling => "Polling",
            WorkerEvent::JobClaimed { .. } => "JobClaimed",
            WorkerEvent::JobStarted { .. } => "JobStarted",
            WorkerEvent::JobCompleted { .. } => "JobCompleted",
            WorkerEvent::JobFailed { .. } => "JobFailed",
            WorkerEvent::JobExhausted { .. } => "JobExhausted",
            WorkerEvent::StaleJobsReaped { .. } => "StaleJobsReaped",
            WorkerEvent::ShuttingDown { .. } => "ShuttingDown",
            WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(name.to_string());
    }
}

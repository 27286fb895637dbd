use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::PageJob;
use crate::job_queue::JobQueue;
use crate::models::{DuplicateGroup, Observation, PageCounts, Scan, ScanStatus};
use crate::traits::FrontierStore;
use crate::util::{normalize_page_url, parse_crawl_url};

/// Snapshot of a scan and its frontier.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan: Scan,
    pub counts: PageCounts,
    /// True if this call is the one that moved the scan to `completed`.
    pub completed_now: bool,
}

/// Attempt ceiling for root jobs unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Everything recorded about the pages of a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFindings {
    /// Per-page observations, ordered by page URL.
    pub observations: Vec<Observation>,
    /// Titles and descriptions reused across pages.
    pub duplicates: Vec<DuplicateGroup>,
}

/// Entry point for starting and inspecting scans.
#[derive(Clone)]
pub struct ScanService<S, Q>
where
    S: FrontierStore,
    Q: JobQueue,
{
    store: S,
    queue: Q,
    max_attempts: u32,
}

impl<S, Q> ScanService<S, Q>
where
    S: FrontierStore,
    Q: JobQueue,
{
    pub fn new(store: S, queue: Q) -> Self {
        Self {
            store,
            queue,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Attempt ceiling for the root job of scans started by this service.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Create a scan for `root_url`, seed its first page and enqueue it.
    ///
    /// The scan is `running` once this returns, or already `completed` when
    /// its only page was processed in the meantime. A failure after the scan
    /// row exists leaves it in `starting`, which no worker will ever complete.
    pub async fn start(&self, root_url: &str) -> Result<Scan, AppError> {
        let root = normalize_page_url(&parse_crawl_url(root_url)?);

        let mut scan = self.store.create_scan(&root).await?;
        let page_id = self.store.seed_page(scan.id, &root).await?;
        let job_id = self
            .queue
            .enqueue(PageJob::new(scan.id, page_id, root.as_str()), self.max_attempts)
            .await?;
        self.store.mark_enqueued(page_id).await?;
        self.store.mark_scan_running(scan.id).await?;
        scan.status = ScanStatus::Running;

        // A fast worker may have finished the root page while the scan was
        // still `starting`, when its own completion check could not apply.
        if self.store.mark_scan_completed(scan.id).await? {
            tracing::info!(scan_id = %scan.id, "Scan completed");
            scan = self.get(scan.id).await?;
        }

        tracing::info!(scan_id = %scan.id, url = %root, %job_id, "Scan started");
        Ok(scan)
    }

    /// Current state of a scan.
    ///
    /// Also runs the completion check, so a scan whose last page was resolved
    /// by a worker that died before checking still reaches `completed`.
    pub async fn status(&self, scan_id: Uuid) -> Result<ScanReport, AppError> {
        let mut scan = self.get(scan_id).await?;
        let counts = self.store.page_counts(scan_id).await?;

        let mut completed_now = false;
        if scan.status == ScanStatus::Running
            && counts.total > 0
            && counts.unfinished() == 0
            && self.store.mark_scan_completed(scan_id).await?
        {
            completed_now = true;
            scan = self.get(scan_id).await?;
            tracing::info!(%scan_id, "Scan completed");
        }

        Ok(ScanReport {
            scan,
            counts,
            completed_now,
        })
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<Scan>, AppError> {
        self.store.list_scans(limit).await
    }

    /// All observations recorded for a scan.
    pub async fn observations(&self, scan_id: Uuid) -> Result<Vec<Observation>, AppError> {
        self.get(scan_id).await?;
        self.store.scan_observations(scan_id).await
    }

    /// Page observations plus the cross-page duplicate checks.
    pub async fn findings(&self, scan_id: Uuid) -> Result<ScanFindings, AppError> {
        let observations = self.observations(scan_id).await?;
        let duplicates = self.store.duplicate_metadata(scan_id).await?;
        Ok(ScanFindings {
            observations,
            duplicates,
        })
    }

    async fn get(&self, scan_id: Uuid) -> Result<Scan, AppError> {
        self.store
            .get_scan(scan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("scan {scan_id}")))
    }
}

use std::future::Future;

use url::Url;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    BeginOutcome, ClaimOutcome, DuplicateGroup, Observation, PageCounts, PageReport, Scan,
};

/// Fetches raw page content over HTTP.
pub trait Fetcher: Send + Sync + Clone {
    /// Download the body of `url`. Timeouts, connection failures and non-2xx
    /// responses are transport errors; an unreadable body is a content error.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Check that `url` answers with a success status without keeping the body.
    fn probe(&self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Extracts crawlable links from page content.
pub trait LinkExtractor: Send + Sync + Clone {
    /// Absolute, same-host, http(s) links found in `html`, resolved against
    /// `page_url`. Must be deterministic.
    fn extract(&self, html: &str, page_url: &Url) -> Vec<String>;
}

/// Runs SEO heuristics over page content.
pub trait PageAnalyzer: Send + Sync + Clone {
    fn analyze(&self, html: &str, page_url: &Url) -> PageReport;
}

/// Durable crawl state: scans, pages and observations.
///
/// Every method that touches more than one row must run in a single
/// transaction. Coordination between workers happens only through these
/// operations; implementations must be safe to call concurrently from many
/// processes.
pub trait FrontierStore: Send + Sync + Clone {
    /// Insert a scan with status `starting`.
    fn create_scan(&self, root_url: &str) -> impl Future<Output = Result<Scan, AppError>> + Send;

    /// Insert the first page of a scan (status `pending`) and return its id.
    ///
    /// Calling it again for the same URL returns the existing id.
    fn seed_page(
        &self,
        scan_id: Uuid,
        url: &str,
    ) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Register a discovered link with an atomic insert-or-ignore on
    /// `(scan_id, url)`.
    ///
    /// `claimant` is the id of the job doing the discovery. A page that is
    /// still pending, was inserted by the same claimant and was never marked
    /// with [`mark_enqueued`](Self::mark_enqueued) is reported as `Claimed`
    /// again, so a retried job enqueues what its earlier attempt inserted but
    /// did not get to enqueue.
    fn try_claim(
        &self,
        scan_id: Uuid,
        url: &str,
        claimant: Uuid,
    ) -> impl Future<Output = Result<ClaimOutcome, AppError>> + Send;

    /// Record that a job for the page has been admitted to the queue.
    fn mark_enqueued(&self, page_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Move a page from `pending` to `processing` under `lease`.
    fn begin_processing(
        &self,
        page_id: Uuid,
        lease: Uuid,
    ) -> impl Future<Output = Result<BeginOutcome, AppError>> + Send;

    /// Persist the analysis and mark the page `completed`, atomically with
    /// inserting its observations. Returns false (and writes nothing) when the
    /// page is not `processing` under `lease`.
    fn complete_page(
        &self,
        page_id: Uuid,
        lease: Uuid,
        report: &PageReport,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Mark a page `failed`. Returns false when the page is not `processing`
    /// under `lease`.
    fn fail_page(
        &self,
        page_id: Uuid,
        lease: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Number of pages of the scan that are not terminal yet.
    fn pending_count(&self, scan_id: Uuid) -> impl Future<Output = Result<i64, AppError>> + Send;

    fn mark_scan_running(&self, scan_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// running → completed, provided no page of the scan is unfinished.
    /// Returns true only for the call that made the transition.
    fn mark_scan_completed(
        &self,
        scan_id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn get_scan(&self, scan_id: Uuid)
    -> impl Future<Output = Result<Option<Scan>, AppError>> + Send;

    /// Most recent scans first.
    fn list_scans(&self, limit: usize) -> impl Future<Output = Result<Vec<Scan>, AppError>> + Send;

    fn page_counts(
        &self,
        scan_id: Uuid,
    ) -> impl Future<Output = Result<PageCounts, AppError>> + Send;

    /// All observations of a scan, ordered by page URL.
    fn scan_observations(
        &self,
        scan_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Observation>, AppError>> + Send;

    /// Titles and descriptions that appear on more than one completed page,
    /// titles first.
    fn duplicate_metadata(
        &self,
        scan_id: Uuid,
    ) -> impl Future<Output = Result<Vec<DuplicateGroup>, AppError>> + Send;
}

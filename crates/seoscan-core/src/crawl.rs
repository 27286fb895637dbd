use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{PageJob, QueuedJob};
use crate::job_queue::JobQueue;
use crate::models::{BeginOutcome, ClaimOutcome, NewObservation, ObservationKind};
use crate::traits::{Fetcher, FrontierStore, LinkExtractor, PageAnalyzer};
use crate::util::parse_crawl_url;
use crate::worker::{JobHandler, JobOutcome};

/// Settings for [`PageProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Attempt ceiling given to jobs enqueued for discovered links.
    pub max_attempts: u32,
    /// Request every referenced image and report the ones that fail.
    pub check_images: bool,
    /// Request every discovered link and report the ones that fail on the
    /// page that links to them.
    pub check_links: bool,
    /// Upper bound on checked URLs per page, for images and links each.
    pub max_checks: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            check_images: false,
            check_links: false,
            max_checks: 50,
        }
    }
}

/// The crawl step run for every page job.
///
/// 1. Claim the page (`pending → processing`); lose the race quietly.
/// 2. Fetch it.
/// 3. Extract links and analyze the content in parallel.
/// 4. Register each link; enqueue only the ones this job won.
/// 5. Persist the report and observations atomically.
///
/// Errors propagate to the worker pool, which owns the retry decision. When
/// the pool gives up, [`JobHandler::exhausted`] marks the page failed.
#[derive(Clone)]
pub struct PageProcessor<S, Q, F, L, A>
where
    S: FrontierStore,
    Q: JobQueue,
    F: Fetcher,
    L: LinkExtractor,
    A: PageAnalyzer,
{
    store: S,
    queue: Q,
    fetcher: F,
    extractor: L,
    analyzer: A,
    config: ProcessorConfig,
}

impl<S, Q, F, L, A> PageProcessor<S, Q, F, L, A>
where
    S: FrontierStore + 'static,
    Q: JobQueue + 'static,
    F: Fetcher + 'static,
    L: LinkExtractor + 'static,
    A: PageAnalyzer + 'static,
{
    pub fn new(
        store: S,
        queue: Q,
        fetcher: F,
        extractor: L,
        analyzer: A,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            queue,
            fetcher,
            extractor,
            analyzer,
            config,
        }
    }

    async fn process(&self, queued: &QueuedJob) -> Result<JobOutcome, AppError> {
        let job = &queued.job;
        let lease = queued.id;

        match self.store.begin_processing(job.page_id, lease).await? {
            BeginOutcome::RaceLost(prior) => return Ok(JobOutcome::Skipped { prior }),
            BeginOutcome::Resumed => {
                tracing::debug!(page_id = %job.page_id, attempt = queued.attempt, "Resuming page");
            }
            BeginOutcome::Started => {}
        }

        let page_url = parse_crawl_url(&job.url)?;
        let html: Arc<str> = self.fetcher.fetch(&job.url).await?.into();
        tracing::debug!(url = %job.url, bytes = html.len(), "Fetched page");

        let links_task = {
            let extractor = self.extractor.clone();
            let (html, page_url) = (Arc::clone(&html), page_url.clone());
            tokio::task::spawn_blocking(move || extractor.extract(&html, &page_url))
        };
        let report_task = {
            let analyzer = self.analyzer.clone();
            let (html, page_url) = (Arc::clone(&html), page_url.clone());
            tokio::task::spawn_blocking(move || analyzer.analyze(&html, &page_url))
        };
        let (links, report) = tokio::join!(links_task, report_task);
        let links = links.map_err(|e| AppError::Generic(format!("Link extraction panicked: {e}")))?;
        let mut report =
            report.map_err(|e| AppError::Generic(format!("Page analysis panicked: {e}")))?;

        if self.config.check_images {
            let broken = self.find_broken(&report.images, ObservationKind::BrokenImage).await;
            report.observations.extend(broken);
        }
        if self.config.check_links {
            let broken = self.find_broken(&links, ObservationKind::BrokenLink).await;
            report.observations.extend(broken);
        }

        let mut links_enqueued = 0;
        for link in &links {
            match self.store.try_claim(job.scan_id, link, lease).await? {
                ClaimOutcome::Claimed(page_id) => {
                    self.queue
                        .enqueue(
                            PageJob::new(job.scan_id, page_id, link.as_str()),
                            self.config.max_attempts,
                        )
                        .await?;
                    self.store.mark_enqueued(page_id).await?;
                    links_enqueued += 1;
                }
                ClaimOutcome::AlreadyExists => {}
            }
        }

        if !self.store.complete_page(job.page_id, lease, &report).await? {
            return Ok(JobOutcome::Superseded);
        }

        for observation in &report.observations {
            tracing::warn!(
                target: "seoscan::audit",
                url = %job.url,
                kind = %observation.kind,
                "{}", observation.message
            );
        }

        self.finish_scan_if_drained(job.scan_id).await;

        Ok(JobOutcome::Processed {
            links_found: links.len(),
            links_enqueued,
            observations: report.observations.len(),
        })
    }

    /// Check `urls` concurrently; each failure becomes a `kind` observation.
    async fn find_broken(&self, urls: &[String], kind: ObservationKind) -> Vec<NewObservation> {
        let mut seen = HashSet::new();
        let targets: Vec<&String> = urls
            .iter()
            .filter(|url| seen.insert(url.as_str()))
            .take(self.config.max_checks)
            .collect();

        let results = join_all(targets.iter().map(|url| self.fetcher.probe(url))).await;

        targets
            .into_iter()
            .zip(results)
            .filter_map(|(url, result)| {
                result.err().map(|e| {
                    tracing::debug!(%url, %kind, error = %e, "URL check failed");
                    NewObservation::new(kind, format!("{kind} found: {url}"))
                })
            })
            .collect()
    }

    /// Completion check: a running scan with no unfinished pages is done.
    async fn finish_scan_if_drained(&self, scan_id: Uuid) {
        let pending = match self.store.pending_count(scan_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(%scan_id, error = %e, "Failed to count pending pages");
                return;
            }
        };
        if pending > 0 {
            return;
        }
        match self.store.mark_scan_completed(scan_id).await {
            Ok(true) => tracing::info!(%scan_id, "Scan completed"),
            Ok(false) => {}
            Err(e) => tracing::error!(%scan_id, error = %e, "Failed to mark scan completed"),
        }
    }
}

impl<S, Q, F, L, A> JobHandler for PageProcessor<S, Q, F, L, A>
where
    S: FrontierStore + 'static,
    Q: JobQueue + 'static,
    F: Fetcher + 'static,
    L: LinkExtractor + 'static,
    A: PageAnalyzer + 'static,
{
    async fn handle(&self, job: &QueuedJob) -> Result<JobOutcome, AppError> {
        self.process(job).await
    }

    async fn exhausted(&self, job: &QueuedJob, reason: &str) {
        let page_id = job.job.page_id;
        match self.store.fail_page(page_id, job.id).await {
            Ok(true) => {
                tracing::warn!(%page_id, url = %job.job.url, %reason, "Page failed");
                self.finish_scan_if_drained(job.job.scan_id).await;
            }
            Ok(false) => {
                tracing::debug!(%page_id, "Page not held by this job, left unchanged");
            }
            Err(e) => {
                tracing::error!(%page_id, error = %e, "Failed to mark page failed");
            }
        }
    }
}

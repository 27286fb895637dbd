pub mod crawl;
pub mod error;
pub mod job;
pub mod job_queue;
pub mod models;
pub mod rate_limit;
pub mod scan;
pub mod traits;
pub mod util;
pub mod worker;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use crawl::{PageProcessor, ProcessorConfig};
pub use error::AppError;
pub use job::{PageJob, QueuedJob, RetryPolicy, WorkerConfig};
pub use job_queue::{JobQueue, StaleJobs};
pub use models::{
    BeginOutcome, ClaimOutcome, DuplicateGroup, NewObservation, Observation, ObservationKind, PageCounts,
    PageReport, PageStatus, Scan, ScanStatus,
};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use scan::{DEFAULT_MAX_ATTEMPTS, ScanFindings, ScanReport, ScanService};
pub use traits::{Fetcher, FrontierStore, LinkExtractor, PageAnalyzer};
pub use worker::{JobHandler, JobOutcome, TracingWorkerReporter, WorkerPool, WorkerReporter};

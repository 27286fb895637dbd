use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Work item carried by the queue: one page of one scan.
///
/// Serialized as `{"scanId": ..., "pageId": ..., "url": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageJob {
    pub scan_id: Uuid,
    pub page_id: Uuid,
    pub url: String,
}

impl PageJob {
    pub fn new(scan_id: Uuid, page_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            scan_id,
            page_id,
            url: url.into(),
        }
    }
}

/// A job as delivered by the queue.
///
/// `id` stays the same across redeliveries of the same job, which lets the
/// page lease recognise a retry of the job that already owns the page.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: PageJob,
    /// Attempt number of this delivery (1-indexed).
    pub attempt: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub worker_id: Option<String>,
}

impl QueuedJob {
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Redelivery policy applied by the worker pool when a handler fails.
///
/// Backoff is exponential: `base_delay * 2^(attempt - 1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the attempt that follows `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        std::cmp::min(delay, self.max_delay)
    }

    /// Whether a job that failed on `job.attempt` with `error` gets another try.
    pub fn should_retry(&self, job: &QueuedJob, error: &AppError) -> bool {
        error.is_retryable() && !job.is_last_attempt() && job.attempt < self.max_attempts
    }

    pub fn next_run_at(&self, attempt: u32) -> DateTime<Utc> {
        let delay = TimeDelta::from_std(self.delay_for_attempt(attempt))
            .unwrap_or(TimeDelta::seconds(self.max_delay.as_secs() as i64));
        Utc::now() + delay
    }
}

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    /// Maximum number of jobs processed at the same time.
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub retry_policy: RetryPolicy,
    /// Running jobs whose lock is older than this are considered abandoned.
    pub lease_timeout: Duration,
    /// How often to look for abandoned jobs.
    pub reap_interval: Duration,
    /// Stop once the queue has no pending or running jobs left.
    pub exit_when_idle: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", &Uuid::new_v4().to_string()[..8]),
            concurrency: 10,
            poll_interval: Duration::from_secs(1),
            retry_policy: RetryPolicy::default(),
            lease_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(60),
            exit_when_idle: false,
        }
    }
}

impl WorkerConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn exit_when_idle(mut self, exit: bool) -> Self {
        self.exit_when_idle = exit;
        self
    }
}

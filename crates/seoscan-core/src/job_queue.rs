use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{PageJob, QueuedJob};

/// Durable, at-least-once queue of page jobs.
///
/// Implementations must support atomic claiming via `SELECT FOR UPDATE SKIP LOCKED`
/// or equivalent to prevent multiple workers from claiming the same job.
/// Jobs only exist while pending or running: completed and exhausted jobs
/// are removed.
pub trait JobQueue: Send + Sync + Clone {
    /// Admit a job. Returns the queue id of the new job.
    fn enqueue(
        &self,
        job: PageJob,
        max_attempts: u32,
    ) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Atomically claim the next due job and count the attempt.
    ///
    /// Returns `None` if no jobs are available.
    fn claim(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<Option<QueuedJob>, AppError>> + Send;

    /// Remove a job that was handled successfully.
    fn complete(&self, job_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Put a failed job back, not to be delivered before `run_at`.
    fn retry(
        &self,
        job_id: Uuid,
        error: &str,
        run_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Drop a job that will not be attempted again.
    fn discard(
        &self,
        job_id: Uuid,
        error: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Release all jobs held by a specific worker (for graceful shutdown).
    ///
    /// The attempt consumed by the claim is given back.
    fn release_worker_jobs(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Return running jobs locked for longer than `lease_timeout` to the
    /// queue. Jobs that have no attempts left are removed instead and
    /// returned so the caller can resolve their pages.
    fn requeue_stale(
        &self,
        lease_timeout: Duration,
    ) -> impl Future<Output = Result<StaleJobs, AppError>> + Send;

    /// Pending plus running jobs.
    fn outstanding(&self) -> impl Future<Output = Result<i64, AppError>> + Send;
}

/// Result of a stale-lease sweep.
#[derive(Debug, Default)]
pub struct StaleJobs {
    /// Jobs put back to pending for another attempt.
    pub requeued: u64,
    /// Jobs removed because every attempt was used.
    pub exhausted: Vec<QueuedJob>,
}

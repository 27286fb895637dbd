use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{QueuedJob, RetryPolicy, WorkerConfig};
use crate::job_queue::JobQueue;
use crate::models::PageStatus;
use crate::rate_limit::RateLimiter;

/// What a handler did with a job it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The page was analyzed and persisted.
    Processed {
        links_found: usize,
        links_enqueued: usize,
        observations: usize,
    },
    /// Another delivery owns the page, or it is already done.
    Skipped { prior: PageStatus },
    /// The page was resolved elsewhere while this job was working on it.
    Superseded,
}

/// Business logic run for every delivered job.
///
/// Retry decisions are not the handler's concern: returning an error hands the
/// job back to the pool's [`RetryPolicy`].
pub trait JobHandler: Send + Sync + Clone + 'static {
    fn handle(&self, job: &QueuedJob)
    -> impl Future<Output = Result<JobOutcome, AppError>> + Send;

    /// Called once the pool has given up on a job.
    fn exhausted(&self, job: &QueuedJob, reason: &str) -> impl Future<Output = ()> + Send;
}

/// Events emitted by the worker pool for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
        concurrency: usize,
    },
    Polling,
    JobClaimed {
        job: &'a QueuedJob,
    },
    JobStarted {
        job_id: Uuid,
        url: &'a str,
        attempt: u32,
    },
    JobCompleted {
        job_id: Uuid,
        url: &'a str,
        outcome: JobOutcome,
    },
    JobFailed {
        job_id: Uuid,
        url: &'a str,
        error: &'a str,
        attempt: u32,
        will_retry: bool,
    },
    JobExhausted {
        job_id: Uuid,
        url: &'a str,
    },
    StaleJobsReaped {
        requeued: u64,
        exhausted: usize,
    },
    ShuttingDown {
        worker_id: &'a str,
        jobs_released: u64,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync + Clone + 'static {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started {
                worker_id,
                concurrency,
            } => {
                tracing::info!(%worker_id, %concurrency, "Worker started");
            }
            WorkerEvent::Polling => {
                tracing::trace!("Polling for jobs");
            }
            WorkerEvent::JobClaimed { job } => {
                tracing::debug!(job_id = %job.id, url = %job.job.url, attempt = job.attempt, "Job claimed");
            }
            WorkerEvent::JobStarted {
                job_id,
                url,
                attempt,
            } => {
                tracing::info!(%job_id, %url, %attempt, "Processing");
            }
            WorkerEvent::JobCompleted {
                job_id,
                url,
                outcome,
            } => match outcome {
                JobOutcome::Processed {
                    links_found,
                    links_enqueued,
                    observations,
                } => {
                    tracing::info!(
                        %job_id, %url, %links_found, %links_enqueued, %observations,
                        "Page processed"
                    );
                }
                JobOutcome::Skipped { prior } => {
                    tracing::debug!(%job_id, %url, %prior, "Page owned elsewhere, skipped");
                }
                JobOutcome::Superseded => {
                    tracing::warn!(%job_id, %url, "Page resolved by another delivery");
                }
            },
            WorkerEvent::JobFailed {
                job_id,
                url,
                error,
                attempt,
                will_retry,
            } => {
                tracing::warn!(%job_id, %url, %error, %attempt, %will_retry, "Job failed");
            }
            WorkerEvent::JobExhausted { job_id, url } => {
                tracing::error!(%job_id, %url, "Job exhausted its attempts, page marked failed");
            }
            WorkerEvent::StaleJobsReaped {
                requeued,
                exhausted,
            } => {
                if requeued > 0 || exhausted > 0 {
                    tracing::warn!(%requeued, %exhausted, "Recovered jobs with expired leases");
                }
            }
            WorkerEvent::ShuttingDown {
                worker_id,
                jobs_released,
            } => {
                tracing::info!(%worker_id, %jobs_released, "Worker shutting down");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// Pulls jobs from the queue and runs up to `concurrency` handlers at once.
///
/// Every admitted job passes through the shared [`RateLimiter`]. Failed jobs
/// are redelivered according to the configured [`RetryPolicy`]; jobs that run
/// out of attempts are handed to [`JobHandler::exhausted`] and dropped.
pub struct WorkerPool<Q, H>
where
    Q: JobQueue + 'static,
    H: JobHandler,
{
    queue: Q,
    handler: H,
    limiter: RateLimiter,
    config: WorkerConfig,
}

impl<Q, H> WorkerPool<Q, H>
where
    Q: JobQueue + 'static,
    H: JobHandler,
{
    pub fn new(queue: Q, handler: H, limiter: RateLimiter, config: WorkerConfig) -> Self {
        Self {
            queue,
            handler,
            limiter,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run the pool until cancellation (or until idle, if configured).
    ///
    /// On shutdown no new jobs are claimed, in-flight jobs run to completion
    /// and any job still held by this worker is released back to the queue.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), AppError> {
        let worker_id = self.config.worker_id.as_str();
        reporter.report(WorkerEvent::Started {
            worker_id,
            concurrency: self.config.concurrency,
        });

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut last_reap: Option<Instant> = None;

        loop {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Job task panicked");
                }
            }

            if cancel_token.is_cancelled() {
                break;
            }

            if last_reap.is_none_or(|t| t.elapsed() >= self.config.reap_interval) {
                self.reap(reporter).await;
                last_reap = Some(Instant::now());
            }

            let permit = tokio::select! {
                permit = permits.clone().acquire_owned() => permit
                    .map_err(|e| AppError::Generic(format!("Worker permits closed: {e}")))?,
                () = cancel_token.cancelled() => break,
            };

            reporter.report(WorkerEvent::Polling);

            match self.queue.claim(worker_id).await {
                Ok(Some(job)) => {
                    reporter.report(WorkerEvent::JobClaimed { job: &job });

                    tokio::select! {
                        () = self.limiter.acquire() => {}
                        // The claimed job is released with the rest below.
                        () = cancel_token.cancelled() => break,
                    }

                    let queue = self.queue.clone();
                    let handler = self.handler.clone();
                    let policy = self.config.retry_policy.clone();
                    let reporter = reporter.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        execute(queue, handler, policy, reporter, job).await;
                    });
                }
                Ok(None) => {
                    drop(permit);
                    if self.config.exit_when_idle && tasks.is_empty() {
                        match self.queue.outstanding().await {
                            Ok(0) => break,
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "Failed to count outstanding jobs"),
                        }
                    }
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "Failed to claim job");
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval * 2) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
            }
        }

        // Let in-flight jobs finish; their outcome is recorded normally.
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Job task panicked");
            }
        }

        let released = self
            .queue
            .release_worker_jobs(worker_id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to release worker jobs");
                0
            });

        reporter.report(WorkerEvent::ShuttingDown {
            worker_id,
            jobs_released: released,
        });
        reporter.report(WorkerEvent::Stopped { worker_id });

        Ok(())
    }

    /// Recover jobs whose worker disappeared without finishing them.
    async fn reap<WR: WorkerReporter>(&self, reporter: &WR) {
        match self.queue.requeue_stale(self.config.lease_timeout).await {
            Ok(stale) => {
                reporter.report(WorkerEvent::StaleJobsReaped {
                    requeued: stale.requeued,
                    exhausted: stale.exhausted.len(),
                });
                for job in &stale.exhausted {
                    reporter.report(WorkerEvent::JobExhausted {
                        job_id: job.id,
                        url: &job.job.url,
                    });
                    self.handler
                        .exhausted(job, "lease expired with no attempts left")
                        .await;
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to requeue stale jobs"),
        }
    }
}

async fn execute<Q, H, WR>(queue: Q, handler: H, policy: RetryPolicy, reporter: WR, job: QueuedJob)
where
    Q: JobQueue,
    H: JobHandler,
    WR: WorkerReporter,
{
    reporter.report(WorkerEvent::JobStarted {
        job_id: job.id,
        url: &job.job.url,
        attempt: job.attempt,
    });

    match handler.handle(&job).await {
        Ok(outcome) => {
            reporter.report(WorkerEvent::JobCompleted {
                job_id: job.id,
                url: &job.job.url,
                outcome,
            });
            if let Err(e) = queue.complete(job.id).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
            }
        }
        Err(err) => {
            let error_msg = err.to_string();
            let will_retry = policy.should_retry(&job, &err);
            reporter.report(WorkerEvent::JobFailed {
                job_id: job.id,
                url: &job.job.url,
                error: &error_msg,
                attempt: job.attempt,
                will_retry,
            });

            if will_retry {
                let run_at = policy.next_run_at(job.attempt);
                if let Err(e) = queue.retry(job.id, &error_msg, run_at).await {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to schedule retry");
                }
            } else {
                reporter.report(WorkerEvent::JobExhausted {
                    job_id: job.id,
                    url: &job.job.url,
                });
                // Resolve the page before the job disappears, so a crash in
                // between leaves a stale job rather than an orphaned page.
                handler.exhausted(&job, &error_msg).await;
                if let Err(e) = queue.discard(job.id, &error_msg).await {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to discard job");
                }
            }
        }
    }
}

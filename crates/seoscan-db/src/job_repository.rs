use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use seoscan_core::error::AppError;
use seoscan_core::job::{PageJob, QueuedJob};
use seoscan_core::job_queue::{JobQueue, StaleJobs};

/// PostgreSQL-backed job queue using `SELECT FOR UPDATE SKIP LOCKED`.
///
/// Rows live only while a job is pending or running: successful and
/// exhausted jobs are deleted.
#[derive(Clone)]
pub struct CrawlJobRepository {
    pool: Pool<Postgres>,
}

impl CrawlJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(e.to_string())
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct CrawlJobRow {
    id: Uuid,
    payload: serde_json::Value,
    attempts: i32,
    max_attempts: i32,
    created_at: DateTime<Utc>,
    worker_id: Option<String>,
}

impl TryFrom<CrawlJobRow> for QueuedJob {
    type Error = AppError;

    fn try_from(row: CrawlJobRow) -> Result<Self, Self::Error> {
        let job: PageJob = serde_json::from_value(row.payload)?;
        Ok(QueuedJob {
            id: row.id,
            job,
            attempt: row.attempts.max(0) as u32,
            max_attempts: row.max_attempts.max(1) as u32,
            enqueued_at: row.created_at,
            worker_id: row.worker_id,
        })
    }
}

const RETURNING: &str = "RETURNING id, payload, attempts, max_attempts, created_at, worker_id";

impl JobQueue for CrawlJobRepository {
    async fn enqueue(&self, job: PageJob, max_attempts: u32) -> Result<Uuid, AppError> {
        let payload = serde_json::to_value(&job)?;
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO crawl_jobs (payload, max_attempts)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(payload)
        .bind(max_attempts.max(1) as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(id)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<QueuedJob>, AppError> {
        let row = sqlx::query_as::<_, CrawlJobRow>(&format!(
            r#"
            UPDATE crawl_jobs
            SET status = 'running', worker_id = $1, locked_at = NOW(), attempts = attempts + 1
            WHERE id = (
                SELECT id FROM crawl_jobs
                WHERE status = 'pending' AND run_at <= NOW()
                ORDER BY run_at, created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            {RETURNING}
            "#
        ))
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let job_id = row.id;
        match QueuedJob::try_from(row) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                // A payload nobody can decode would be redelivered forever.
                tracing::error!(%job_id, error = %e, "Dropping job with unreadable payload");
                self.discard(job_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), AppError> {
        sqlx::query(r#"DELETE FROM crawl_jobs WHERE id = $1"#)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn retry(&self, job_id: Uuid, error: &str, run_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE crawl_jobs
            SET status = 'pending', run_at = $3, last_error = $2, worker_id = NULL, locked_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(error)
        .bind(run_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn discard(&self, job_id: Uuid, error: &str) -> Result<(), AppError> {
        let removed = sqlx::query(r#"DELETE FROM crawl_jobs WHERE id = $1"#)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if removed.rows_affected() > 0 {
            tracing::debug!(%job_id, %error, "Job discarded");
        }
        Ok(())
    }

    async fn release_worker_jobs(&self, worker_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE crawl_jobs
            SET status = 'pending', worker_id = NULL, locked_at = NULL,
                attempts = GREATEST(attempts - 1, 0)
            WHERE worker_id = $1 AND status = 'running'
            "#,
        )
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    async fn requeue_stale(&self, lease_timeout: Duration) -> Result<StaleJobs, AppError> {
        let lease_secs = lease_timeout.as_secs_f64();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exhausted_rows = sqlx::query_as::<_, CrawlJobRow>(&format!(
            r#"
            DELETE FROM crawl_jobs
            WHERE status = 'running'
              AND locked_at < NOW() - make_interval(secs => $1)
              AND attempts >= max_attempts
            {RETURNING}
            "#
        ))
        .bind(lease_secs)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let requeued = sqlx::query(
            r#"
            UPDATE crawl_jobs
            SET status = 'pending', worker_id = NULL, locked_at = NULL,
                last_error = 'lease expired'
            WHERE status = 'running'
              AND locked_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(lease_secs)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        tx.commit().await.map_err(db_err)?;

        let mut exhausted = Vec::with_capacity(exhausted_rows.len());
        for row in exhausted_rows {
            let job_id = row.id;
            match QueuedJob::try_from(row) {
                Ok(job) => exhausted.push(job),
                Err(e) => tracing::error!(%job_id, error = %e, "Stale job had unreadable payload"),
            }
        }

        Ok(StaleJobs {
            requeued,
            exhausted,
        })
    }

    async fn outstanding(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM crawl_jobs"#)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(count)
    }
}

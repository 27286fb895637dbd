use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use seoscan_core::error::AppError;
use seoscan_core::models::{
    BeginOutcome, ClaimOutcome, DuplicateGroup, Observation, ObservationKind, PageCounts,
    PageReport, PageStatus, Scan, ScanStatus,
};
use seoscan_core::traits::FrontierStore;

/// PostgreSQL-backed crawl frontier.
///
/// Cross-worker coordination relies on the `UNIQUE (scan_id, url)` constraint
/// for link dedup and on row locks plus lease-guarded `UPDATE`s for page
/// transitions.
#[derive(Clone)]
pub struct FrontierRepository {
    pool: Pool<Postgres>,
}

impl FrontierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(e.to_string())
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ScanRow {
    id: Uuid,
    start_url: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl TryFrom<ScanRow> for Scan {
    type Error = AppError;

    fn try_from(row: ScanRow) -> Result<Self, Self::Error> {
        let status: ScanStatus = row.status.parse().map_err(AppError::DatabaseError)?;
        Ok(Scan {
            id: row.id,
            start_url: row.start_url,
            status,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ObservationRow {
    id: Uuid,
    page_id: Uuid,
    url: String,
    #[sqlx(rename = "type")]
    kind: String,
    message: String,
}

impl From<ObservationRow> for Observation {
    fn from(row: ObservationRow) -> Self {
        Observation {
            id: row.id,
            page_id: row.page_id,
            url: row.url,
            kind: row.kind,
            message: row.message,
        }
    }
}

impl FrontierStore for FrontierRepository {
    async fn create_scan(&self, root_url: &str) -> Result<Scan, AppError> {
        let row = sqlx::query_as::<_, ScanRow>(
            r#"
            INSERT INTO scans (start_url)
            VALUES ($1)
            RETURNING id, start_url, status, start_time, end_time
            "#,
        )
        .bind(root_url)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.try_into()
    }

    async fn seed_page(&self, scan_id: Uuid, url: &str) -> Result<Uuid, AppError> {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO pages (scan_id, url)
            VALUES ($1, $2)
            ON CONFLICT (scan_id, url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(scan_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some((id,)) = inserted {
            return Ok(id);
        }

        let (id,): (Uuid,) = sqlx::query_as(r#"SELECT id FROM pages WHERE scan_id = $1 AND url = $2"#)
            .bind(scan_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    async fn try_claim(
        &self,
        scan_id: Uuid,
        url: &str,
        claimant: Uuid,
    ) -> Result<ClaimOutcome, AppError> {
        // Concurrent inserts of the same (scan_id, url) serialize on the
        // unique index; exactly one of them gets a row back.
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO pages (scan_id, url, discovered_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (scan_id, url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(scan_id)
        .bind(url)
        .bind(claimant)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some((id,)) = inserted {
            return Ok(ClaimOutcome::Claimed(id));
        }

        // Our own earlier attempt may have inserted it and died before enqueueing.
        let own: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM pages
            WHERE scan_id = $1 AND url = $2
              AND status = 'pending'
              AND discovered_by = $3
              AND enqueued_at IS NULL
            "#,
        )
        .bind(scan_id)
        .bind(url)
        .bind(claimant)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(match own {
            Some((id,)) => ClaimOutcome::Claimed(id),
            None => ClaimOutcome::AlreadyExists,
        })
    }

    async fn mark_enqueued(&self, page_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE pages SET enqueued_at = COALESCE(enqueued_at, NOW())
            WHERE id = $1
            "#,
        )
        .bind(page_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("page {page_id}")));
        }
        Ok(())
    }

    async fn begin_processing(&self, page_id: Uuid, lease: Uuid) -> Result<BeginOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let current: Option<(String, Option<Uuid>)> =
            sqlx::query_as(r#"SELECT status, lease FROM pages WHERE id = $1 FOR UPDATE"#)
                .bind(page_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

        let Some((status, current_lease)) = current else {
            return Err(AppError::NotFound(format!("page {page_id}")));
        };
        let status: PageStatus = status.parse().map_err(AppError::DatabaseError)?;

        let outcome = match status {
            PageStatus::Processing if current_lease == Some(lease) => BeginOutcome::Resumed,
            status if status.can_transition_to(PageStatus::Processing) => {
                sqlx::query(
                    r#"
                    UPDATE pages
                    SET status = 'processing', lease = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(page_id)
                .bind(lease)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                BeginOutcome::Started
            }
            prior => BeginOutcome::RaceLost(prior),
        };

        tx.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    async fn complete_page(
        &self,
        page_id: Uuid,
        lease: Uuid,
        report: &PageReport,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            r#"
            UPDATE pages
            SET status = 'completed', title = $3, description = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND lease = $2
            "#,
        )
        .bind(page_id)
        .bind(lease)
        .bind(&report.title)
        .bind(&report.description)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        if !report.observations.is_empty() {
            let (kinds, messages): (Vec<String>, Vec<String>) = report
                .observations
                .iter()
                .map(|o| (o.kind.as_str().to_string(), o.message.clone()))
                .unzip();

            sqlx::query(
                r#"
                INSERT INTO observations (page_id, type, message)
                SELECT $1, t.type, t.message
                FROM UNNEST($2::text[], $3::text[]) AS t(type, message)
                "#,
            )
            .bind(page_id)
            .bind(&kinds)
            .bind(&messages)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn fail_page(&self, page_id: Uuid, lease: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE pages
            SET status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND lease = $2
            "#,
        )
        .bind(page_id)
        .bind(lease)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn pending_count(&self, scan_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM pages
            WHERE scan_id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(scan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(count)
    }

    async fn mark_scan_running(&self, scan_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE scans SET status = 'running'
            WHERE id = $1 AND status = 'starting'
            "#,
        )
        .bind(scan_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 && self.get_scan(scan_id).await?.is_none() {
            return Err(AppError::NotFound(format!("scan {scan_id}")));
        }
        Ok(())
    }

    async fn mark_scan_completed(&self, scan_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE scans SET status = 'completed', end_time = NOW()
            WHERE id = $1
              AND status = 'running'
              AND NOT EXISTS (
                  SELECT 1 FROM pages
                  WHERE scan_id = $1 AND status IN ('pending', 'processing')
              )
            "#,
        )
        .bind(scan_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_scan(&self, scan_id: Uuid) -> Result<Option<Scan>, AppError> {
        let row = sqlx::query_as::<_, ScanRow>(
            r#"SELECT id, start_url, status, start_time, end_time FROM scans WHERE id = $1"#,
        )
        .bind(scan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Scan::try_from).transpose()
    }

    async fn list_scans(&self, limit: usize) -> Result<Vec<Scan>, AppError> {
        let rows = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, start_url, status, start_time, end_time
            FROM scans
            ORDER BY start_time DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Scan::try_from).collect()
    }

    async fn page_counts(&self, scan_id: Uuid) -> Result<PageCounts, AppError> {
        let (total, pending, processing, completed, failed): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'pending'),
                    COUNT(*) FILTER (WHERE status = 'processing'),
                    COUNT(*) FILTER (WHERE status = 'completed'),
                    COUNT(*) FILTER (WHERE status = 'failed')
                FROM pages
                WHERE scan_id = $1
                "#,
            )
            .bind(scan_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(PageCounts {
            total,
            pending,
            processing,
            completed,
            failed,
        })
    }

    async fn scan_observations(&self, scan_id: Uuid) -> Result<Vec<Observation>, AppError> {
        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT o.id, o.page_id, p.url, o.type, o.message
            FROM observations o
            JOIN pages p ON p.id = o.page_id
            WHERE p.scan_id = $1
            ORDER BY p.url, o.created_at, o.id
            "#,
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn duplicate_metadata(&self, scan_id: Uuid) -> Result<Vec<DuplicateGroup>, AppError> {
        let rows: Vec<(String, String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT 'title' AS field, title AS value, array_agg(url ORDER BY url) AS urls
            FROM pages
            WHERE scan_id = $1 AND status = 'completed' AND COALESCE(title, '') <> ''
            GROUP BY title
            HAVING COUNT(*) > 1
            UNION ALL
            SELECT 'description', description, array_agg(url ORDER BY url)
            FROM pages
            WHERE scan_id = $1 AND status = 'completed' AND COALESCE(description, '') <> ''
            GROUP BY description
            HAVING COUNT(*) > 1
            ORDER BY field DESC, value
            "#,
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(field, value, urls)| DuplicateGroup {
                kind: if field == "title" {
                    ObservationKind::DuplicateTitle
                } else {
                    ObservationKind::DuplicateDescription
                },
                value,
                urls,
            })
            .collect())
    }
}

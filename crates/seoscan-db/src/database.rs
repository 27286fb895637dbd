use seoscan_core::AppError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;
use crate::frontier_repository::FrontierRepository;
use crate::job_repository::CrawlJobRepository;

/// Schema for both the frontier tables and the crawl job queue.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Owns one PostgreSQL pool and hands out the repositories built on it.
///
/// The frontier and the queue may use the same `Database` or two separate
/// ones; each side only ever touches its own tables.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        tracing::debug!(max_connections = config.max_connections, "Database pool opened");
        Ok(Self { pool })
    }

    /// Wrap an already connected pool (tests share one pool across repos).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations. Safe to call from every process on startup.
    pub async fn migrate(&self) -> Result<(), AppError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))
    }

    pub fn frontier_repo(&self) -> FrontierRepository {
        FrontierRepository::new(self.pool.clone())
    }

    pub fn job_repo(&self) -> CrawlJobRepository {
        CrawlJobRepository::new(self.pool.clone())
    }

    /// Close the pool, waiting for checked-out connections to come back.
    ///
    /// Clones share the pool, so closing one closes all of them.
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
        }
    }
}

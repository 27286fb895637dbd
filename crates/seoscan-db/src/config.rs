use seoscan_core::AppError;

/// Configuration for a database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
        }
    }

    /// Read the frontier store configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| {
            AppError::ConfigError("DATABASE_URL not set. Required for database operations.".into())
        })?;
        Ok(Self {
            url,
            max_connections: max_connections_from_env()?,
        })
    }

    /// Read the job queue configuration from environment variables.
    ///
    /// `QUEUE_DATABASE_URL` points the queue at its own database; when unset
    /// the queue shares `DATABASE_URL`.
    pub fn queue_from_env() -> Result<Self, AppError> {
        match std::env::var("QUEUE_DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Ok(Self {
                url,
                max_connections: max_connections_from_env()?,
            }),
            _ => Self::from_env(),
        }
    }

    /// True when both configurations point at the same database.
    pub fn same_database(&self, other: &DatabaseConfig) -> bool {
        self.url == other.url
    }
}

fn max_connections_from_env() -> Result<u32, AppError> {
    match std::env::var("DATABASE_MAX_CONNECTIONS") {
        Err(_) => Ok(5),
        Ok(raw) => parse_max_connections(&raw),
    }
}

fn parse_max_connections(raw: &str) -> Result<u32, AppError> {
    let parsed: u32 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
        ))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(
            "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
        ));
    }
    Ok(parsed)
}

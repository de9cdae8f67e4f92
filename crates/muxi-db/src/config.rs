use std::time::Duration;

use muxi_core::AppError;

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Connection attempts at startup before giving up.
    pub connect_retries: u32,
    /// Pause between two connection attempts.
    pub retry_delay: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            connect_retries: 15,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 5)
    /// - `DATABASE_CONNECT_RETRIES` (optional, defaults to 15)
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| {
            AppError::ConfigError("DATABASE_URL not set. Required for database operations.".into())
        })?;

        let mut config = Self::new(url);
        if let Some(max) = positive_from_env("DATABASE_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(retries) = positive_from_env("DATABASE_CONNECT_RETRIES")? {
            config.connect_retries = retries;
        }
        Ok(config)
    }
}

fn positive_from_env(key: &str) -> Result<Option<u32>, AppError> {
    match std::env::var(key) {
        Err(_) => Ok(None),
        Ok(raw) => parse_positive(key, &raw).map(Some),
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u32, AppError> {
    let parsed: u32 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid {key} '{raw}': must be a positive integer"
        ))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(parsed)
}

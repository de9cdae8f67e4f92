use muxi_core::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::book_repository::BookRepository;
use crate::borrow_repository::BorrowRepository;
use crate::catalog_repository::CatalogRepository;
use crate::config::DatabaseConfig;
use crate::inventory_repository::InventoryRepository;
use crate::user_repository::UserRepository;

/// Central database facade: owns the connection pool, runs migrations,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL, retrying while the server comes up.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let attempts = config.connect_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&config.url)
                .await
            {
                Ok(pool) => {
                    tracing::info!("Connected to database");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    tracing::warn!("Database not reachable ({attempt}/{attempts}): {e}");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(config.retry_delay).await;
                    }
                }
            }
        }

        Err(AppError::DatabaseError(format!(
            "Failed to connect after {attempts} attempts: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Get a [`UserRepository`] backed by this pool.
    pub fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Get a [`BookRepository`] backed by this pool.
    pub fn book_repo(&self) -> BookRepository {
        BookRepository::new(self.pool.clone())
    }

    /// Get a [`BorrowRepository`] backed by this pool.
    pub fn borrow_repo(&self) -> BorrowRepository {
        BorrowRepository::new(self.pool.clone())
    }

    /// Get a [`CatalogRepository`] backed by this pool.
    pub fn catalog_repo(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Get an [`InventoryRepository`] backed by this pool.
    pub fn inventory_repo(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

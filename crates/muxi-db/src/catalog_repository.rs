use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};

use muxi_core::error::AppError;
use muxi_core::game::{CatalogEntry, CatalogKind, NewCatalogEntry, Rarity};
use muxi_core::pagination::{Page, Pagination};

use crate::error::{db_error, map_unique};

/// Repository for the game catalog: achievements, skills, cards and items.
///
/// Each kind lives in its own table; rows are read through a common column
/// list so they map onto one [`CatalogEntry`] shape.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an entry. Call [`NewCatalogEntry::validated`] first.
    pub async fn create(&self, entry: &NewCatalogEntry) -> Result<CatalogEntry, AppError> {
        let conflict = format!("a {} named '{}' already exists", entry.kind, entry.name);
        let columns = entry_columns(entry.kind);

        let row = match entry.kind {
            CatalogKind::Skill => {
                sqlx::query_as::<_, CatalogRow>(&format!(
                    "INSERT INTO skills (name, description, max_level) VALUES ($1, $2, $3) RETURNING {columns}"
                ))
                .bind(&entry.name)
                .bind(&entry.description)
                .bind(entry.max_level.unwrap_or(10))
                .fetch_one(&self.pool)
                .await
            }
            CatalogKind::Card => {
                sqlx::query_as::<_, CatalogRow>(&format!(
                    "INSERT INTO cards (name, description, rarity) VALUES ($1, $2, $3) RETURNING {columns}"
                ))
                .bind(&entry.name)
                .bind(&entry.description)
                .bind(entry.rarity.unwrap_or(Rarity::Common).as_str())
                .fetch_one(&self.pool)
                .await
            }
            CatalogKind::Achievement | CatalogKind::Item => {
                sqlx::query_as::<_, CatalogRow>(&format!(
                    "INSERT INTO {} (name, description) VALUES ($1, $2) RETURNING {columns}",
                    entry.kind.table()
                ))
                .bind(&entry.name)
                .bind(&entry.description)
                .fetch_one(&self.pool)
                .await
            }
        }
        .map_err(|e| map_unique(e, &conflict))?;

        Ok(row.into_entry(entry.kind))
    }

    pub async fn get(&self, kind: CatalogKind, id: i64) -> Result<Option<CatalogEntry>, AppError> {
        let row = sqlx::query_as::<_, CatalogRow>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            entry_columns(kind),
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|r| r.into_entry(kind)))
    }

    /// List entries of one kind ordered by id.
    pub async fn list(
        &self,
        kind: CatalogKind,
        pagination: Pagination,
    ) -> Result<Page<CatalogEntry>, AppError> {
        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", kind.table()))
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let rows = sqlx::query_as::<_, CatalogRow>(&format!(
            "SELECT {} FROM {} ORDER BY id ASC LIMIT $1 OFFSET $2",
            entry_columns(kind),
            kind.table()
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.into_entry(kind)).collect(),
            total,
            pagination,
        ))
    }

    /// Delete an entry; ownership rows cascade. Returns false when it did not exist.
    pub async fn delete(&self, kind: CatalogKind, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Column list yielding a [`CatalogRow`] for any kind.
pub(crate) fn entry_columns(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Achievement | CatalogKind::Item => {
            "id, name, description, NULL::INTEGER AS max_level, NULL::VARCHAR AS rarity, created_at"
        }
        CatalogKind::Skill => {
            "id, name, description, max_level, NULL::VARCHAR AS rarity, created_at"
        }
        CatalogKind::Card => "id, name, description, NULL::INTEGER AS max_level, rarity, created_at",
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
pub(crate) struct CatalogRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) max_level: Option<i32>,
    pub(crate) rarity: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl CatalogRow {
    pub(crate) fn into_entry(self, kind: CatalogKind) -> CatalogEntry {
        CatalogEntry {
            id: self.id,
            kind,
            name: self.name,
            description: self.description,
            max_level: self.max_level,
            rarity: self.rarity.and_then(|r| r.parse().ok()),
            created_at: self.created_at,
        }
    }
}

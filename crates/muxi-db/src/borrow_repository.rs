use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};

use muxi_core::error::AppError;
use muxi_core::models::{BorrowRecord, BorrowStatus, RecordFilter};
use muxi_core::pagination::{Page, Pagination};

use crate::book_repository::lock_book;
use crate::error::{db_error, map_unique};

const ALREADY_ON_LOAN: &str = "you already have this book on loan";

/// Repository for lending books out and taking them back.
#[derive(Clone)]
pub struct BorrowRepository {
    pool: Pool<Postgres>,
}

impl BorrowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lend one copy of `book_id` to `user_id`.
    ///
    /// The book row stays locked from the stock check until the decrement commits.
    pub async fn borrow(&self, user_id: i64, book_id: i64) -> Result<BorrowRecord, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let book = lock_book(&mut tx, book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book".into()))?;

        if book.stock <= 0 {
            return Err(AppError::Conflict("book is out of stock".into()));
        }

        let (on_loan,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM borrow_records
                WHERE user_id = $1 AND book_id = $2 AND status = 'borrowed'
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        if on_loan {
            return Err(AppError::Conflict(ALREADY_ON_LOAN.into()));
        }

        sqlx::query(r#"UPDATE books SET stock = stock - 1, updated_at = NOW() WHERE id = $1"#)
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let row = sqlx::query_as::<_, BorrowRecordRow>(
            r#"
            INSERT INTO borrow_records (user_id, book_id, status)
            VALUES ($1, $2, 'borrowed')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, ALREADY_ON_LOAN))?;

        tx.commit().await.map_err(db_error)?;

        tracing::debug!(user_id, book_id, record_id = row.id, "Book borrowed");
        Ok(row.into())
    }

    /// Close an open borrow record owned by `user_id` and put the copy back.
    pub async fn return_book(&self, user_id: i64, record_id: i64) -> Result<BorrowRecord, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let record = sqlx::query_as::<_, BorrowRecordRow>(
            r#"SELECT * FROM borrow_records WHERE id = $1 AND user_id = $2 FOR UPDATE"#,
        )
        .bind(record_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| AppError::NotFound("Borrow record".into()))?;

        if record.status == BorrowStatus::Returned.as_str() {
            return Err(AppError::Conflict("book already returned".into()));
        }

        lock_book(&mut tx, record.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book".into()))?;

        let row = sqlx::query_as::<_, BorrowRecordRow>(
            r#"
            UPDATE borrow_records
            SET status = 'returned', return_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(record_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query(r#"UPDATE books SET stock = stock + 1, updated_at = NOW() WHERE id = $1"#)
            .bind(record.book_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        tracing::debug!(user_id, record_id, "Book returned");
        Ok(row.into())
    }

    pub async fn get(&self, record_id: i64) -> Result<Option<BorrowRecord>, AppError> {
        let row =
            sqlx::query_as::<_, BorrowRecordRow>(r#"SELECT * FROM borrow_records WHERE id = $1"#)
                .bind(record_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        Ok(row.map(Into::into))
    }

    /// List records, newest borrow first.
    pub async fn list(
        &self,
        filter: RecordFilter,
        pagination: Pagination,
    ) -> Result<Page<BorrowRecord>, AppError> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM borrow_records WHERE TRUE");
        push_record_filter(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM borrow_records WHERE TRUE");
        push_record_filter(&mut select, filter);
        select
            .push(" ORDER BY borrow_at DESC, id DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows: Vec<BorrowRecordRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            total,
            pagination,
        ))
    }
}

fn push_record_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: RecordFilter) {
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(book_id) = filter.book_id {
        builder.push(" AND book_id = ").push_bind(book_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct BorrowRecordRow {
    id: i64,
    user_id: i64,
    book_id: i64,
    borrow_at: DateTime<Utc>,
    return_at: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BorrowRecordRow> for BorrowRecord {
    fn from(row: BorrowRecordRow) -> Self {
        BorrowRecord {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            borrow_at: row.borrow_at,
            return_at: row.return_at,
            status: row.status.parse().unwrap_or(BorrowStatus::Borrowed),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

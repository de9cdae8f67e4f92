use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Pool, Postgres, QueryBuilder};

use muxi_core::error::AppError;
use muxi_core::models::{Book, BookFilter, BookPatch, NewBook};
use muxi_core::pagination::{Page, Pagination};
use muxi_core::search::contains_pattern;

use crate::error::{db_error, map_unique};

const DUPLICATE_BOOK: &str = "a book with the same title and author already exists";

/// Repository for the book catalogue and its stock counters.
#[derive(Clone)]
pub struct BookRepository {
    pool: Pool<Postgres>,
}

/// Result of a book update: the new row plus the cover it replaced, if any.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub book: Book,
    pub replaced_cover: Option<String>,
}

impl BookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a book with all copies on the shelf.
    pub async fn create(&self, book: &NewBook) -> Result<Book, AppError> {
        if book.initial_stock < 0 {
            return Err(AppError::ValidationError(
                "initial_stock must not be negative".into(),
            ));
        }

        let row = sqlx::query_as::<_, BookRow>(
            r#"
            INSERT INTO books (title, author, summary, cover_path, initial_stock, stock, total_stock)
            VALUES ($1, $2, $3, $4, $5, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.summary)
        .bind(&book.cover_path)
        .bind(book.initial_stock)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, DUPLICATE_BOOK))?;

        Ok(row.into())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Book>, AppError> {
        let row = sqlx::query_as::<_, BookRow>(r#"SELECT * FROM books WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(Into::into))
    }

    /// Whether a book with exactly this title and author exists.
    pub async fn exists(&self, title: &str, author: &str) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (SELECT 1 FROM books WHERE title = $1 AND author = $2)"#,
        )
        .bind(title)
        .bind(author)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(exists)
    }

    /// Search books by case-insensitive substrings, ordered by id.
    pub async fn list(
        &self,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<Page<Book>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books WHERE TRUE");
        push_book_filter(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM books WHERE TRUE");
        push_book_filter(&mut select, filter);
        select
            .push(" ORDER BY id ASC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows: Vec<BookRow> = select
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

    /// Apply a partial update with the row locked.
    ///
    /// A new `total_stock` moves `stock` by the same delta, so the number of
    /// copies out on loan is preserved; totals below that number are refused.
    pub async fn update(&self, id: i64, patch: &BookPatch) -> Result<BookUpdate, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let current = lock_book(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book".into()))?;

        let (stock, total_stock) = match patch.total_stock {
            Some(total) => restock(&current, total)?,
            None => (current.stock, current.total_stock),
        };

        let row = sqlx::query_as::<_, BookRow>(
            r#"
            UPDATE books
            SET title = $2, author = $3, summary = $4, cover_path = $5,
                stock = $6, total_stock = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref().unwrap_or(&current.title))
        .bind(patch.author.as_deref().unwrap_or(&current.author))
        .bind(patch.summary.as_deref().unwrap_or(&current.summary))
        .bind(patch.cover_path.as_deref().unwrap_or(&current.cover_path))
        .bind(stock)
        .bind(total_stock)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, DUPLICATE_BOOK))?;

        tx.commit().await.map_err(db_error)?;

        let replaced_cover = match &patch.cover_path {
            Some(new) if *new != current.cover_path => Some(current.cover_path),
            _ => None,
        };

        Ok(BookUpdate {
            book: row.into(),
            replaced_cover,
        })
    }

    /// Delete a book whose copies are all on the shelf. Returns the deleted row.
    pub async fn delete(&self, id: i64) -> Result<Book, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let book = lock_book(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book".into()))?;

        if !book.is_fully_shelved() {
            return Err(AppError::Conflict(format!(
                "{} copies of this book are still borrowed",
                book.borrowed_count()
            )));
        }

        sqlx::query(r#"DELETE FROM books WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(book)
    }
}

/// New `(stock, total_stock)` after changing the number of owned copies.
fn restock(book: &Book, new_total: i32) -> Result<(i32, i32), AppError> {
    if new_total < 0 {
        return Err(AppError::ValidationError(
            "total_stock must not be negative".into(),
        ));
    }
    let borrowed = book.borrowed_count();
    if new_total < borrowed {
        return Err(AppError::Conflict(format!(
            "total_stock {new_total} is below the {borrowed} copies currently borrowed"
        )));
    }
    Ok((new_total - borrowed, new_total))
}

/// Read a book with `FOR UPDATE` inside an open transaction.
pub(crate) async fn lock_book(conn: &mut PgConnection, id: i64) -> Result<Option<Book>, AppError> {
    let row = sqlx::query_as::<_, BookRow>(r#"SELECT * FROM books WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(row.map(Into::into))
}

fn push_book_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    let columns = [
        ("title", &filter.title),
        ("author", &filter.author),
        ("summary", &filter.summary),
    ];
    for (column, keyword) in columns {
        if let Some(keyword) = keyword {
            builder
                .push(format!(" AND {column} ILIKE "))
                .push_bind(contains_pattern(keyword));
        }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    author: String,
    summary: String,
    cover_path: String,
    initial_stock: i32,
    stock: i32,
    total_stock: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            summary: row.summary,
            cover_path: row.cover_path,
            initial_stock: row.initial_stock,
            stock: row.stock,
            total_stock: row.total_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

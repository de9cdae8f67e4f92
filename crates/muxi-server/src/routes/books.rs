use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;

use muxi_core::error::AppError;
use muxi_core::models::{BookFilter, BookPatch, DEFAULT_COVER_PATH, DEFAULT_SUMMARY, NewBook};
use muxi_core::pagination::Pagination;
use muxi_core::storage::COVER_PREFIX;

use crate::dto::{
    BookListQuery, BookResponse, CreateBookForm, Envelope, PaginatedData, UpdateBookForm,
};
use crate::error::ApiError;
use crate::extract::{MultipartForm, UploadedFile, keyword, parse_id};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/books",
    params(BookListQuery),
    responses(
        (status = 200, description = "Matching books", body = Envelope<PaginatedData<BookResponse>>),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "books"
)]
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = BookFilter {
        title: keyword(query.title.as_deref()),
        author: keyword(query.author.as_deref()),
        summary: keyword(query.summary.as_deref()),
    };
    let pagination = Pagination::from_raw(query.page.as_deref(), query.page_size.as_deref());

    let page = state.db.book_repo().list(&filter, pagination).await?;
    Ok(Envelope::ok(PaginatedData::<BookResponse>::from_page(page)))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book details", body = Envelope<BookResponse>),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "books"
)]
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "book id")?;
    let book = state
        .db
        .book_repo()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book".into()))?;

    Ok(Envelope::ok(BookResponse::from(book)))
}

#[utoipa::path(
    post,
    path = "/api/admin/books",
    request_body(content = CreateBookForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Book created", body = Envelope<BookResponse>),
        (status = 400, description = "Invalid form", body = crate::dto::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::dto::ErrorResponse),
        (status = 409, description = "Duplicate title and author", body = crate::dto::ErrorResponse),
        (status = 413, description = "Upload too large", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let title = form.required_text("title")?;
    let author = form.required_text("author")?;
    let summary = form.text("summary").unwrap_or(DEFAULT_SUMMARY).to_string();
    let initial_stock = form.int("initial_stock")?.unwrap_or(0);
    if initial_stock < 0 {
        return Err(AppError::ValidationError("initial_stock must not be negative".into()).into());
    }

    let repo = state.db.book_repo();
    if repo.exists(&title, &author).await? {
        return Err(AppError::Conflict(
            "a book with the same title and author already exists".into(),
        )
        .into());
    }

    let uploaded = save_cover(&state, form.take_file("cover")).await?;
    let new_book = NewBook {
        title,
        author,
        summary,
        cover_path: uploaded
            .clone()
            .unwrap_or_else(|| DEFAULT_COVER_PATH.to_string()),
        initial_stock,
    };

    let book = match repo.create(&new_book).await {
        Ok(book) => book,
        Err(e) => {
            if let Some(path) = &uploaded {
                state.images.remove_quietly(path).await;
            }
            return Err(e.into());
        }
    };

    tracing::info!(book_id = book.id, title = %book.title, "Book created");
    Ok(Envelope::ok_with_message("book created", BookResponse::from(book)))
}

#[utoipa::path(
    put,
    path = "/api/admin/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    request_body(content = UpdateBookForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Book updated", body = Envelope<BookResponse>),
        (status = 400, description = "Invalid form or nothing to update", body = crate::dto::ErrorResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Stock below borrowed copies, or duplicate", body = crate::dto::ErrorResponse),
        (status = 413, description = "Upload too large", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "book id")?;
    let mut form = MultipartForm::read(multipart).await?;

    let mut patch = BookPatch {
        title: form.text("title").map(String::from),
        author: form.text("author").map(String::from),
        summary: form.text("summary").map(String::from),
        cover_path: None,
        total_stock: form.int("total_stock")?,
    };
    let cover = form.take_file("cover");
    if patch.is_empty() && cover.is_none() {
        return Err(AppError::ValidationError("nothing to update".into()).into());
    }

    patch.cover_path = save_cover(&state, cover).await?;

    let update = match state.db.book_repo().update(id, &patch).await {
        Ok(update) => update,
        Err(e) => {
            if let Some(path) = &patch.cover_path {
                state.images.remove_quietly(path).await;
            }
            return Err(e.into());
        }
    };
    if let Some(old) = &update.replaced_cover {
        state.images.remove_quietly(old).await;
    }

    tracing::info!(book_id = id, "Book updated");
    Ok(Envelope::ok_with_message(
        "book updated",
        BookResponse::from(update.book),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted", body = crate::dto::ErrorResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Copies still on loan", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "book id")?;
    let book = state.db.book_repo().delete(id).await?;
    state.images.remove_quietly(&book.cover_path).await;

    tracing::info!(book_id = id, "Book deleted");
    Ok(Envelope::<()>::message("book deleted"))
}

async fn save_cover(
    state: &AppState,
    file: Option<UploadedFile>,
) -> Result<Option<String>, AppError> {
    match file {
        Some(file) => state
            .images
            .save(COVER_PREFIX, &file.file_name, &file.bytes)
            .await
            .map(Some),
        None => Ok(None),
    }
}

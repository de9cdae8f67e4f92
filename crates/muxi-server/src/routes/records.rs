use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use muxi_core::models::RecordFilter;
use muxi_core::pagination::Pagination;

use crate::auth::AuthUser;
use crate::dto::{AdminRecordQuery, Envelope, PaginatedData, RecordListQuery, RecordResponse};
use crate::error::ApiError;
use crate::extract::{parse_id, parse_optional_id, parse_status};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/books/{id}/borrow",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book lent out", body = Envelope<RecordResponse>),
        (status = 404, description = "Book not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Out of stock or already on loan", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "records"
)]
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let book_id = parse_id(&id, "book id")?;
    let record = state.db.borrow_repo().borrow(user.id, book_id).await?;

    tracing::info!(user_id = user.id, book_id, record_id = record.id, "Book borrowed");
    Ok(Envelope::ok_with_message(
        "book borrowed",
        RecordResponse::from(record),
    ))
}

#[utoipa::path(
    post,
    path = "/api/records/{id}/return",
    params(("id" = i64, Path, description = "Borrow record id")),
    responses(
        (status = 200, description = "Book returned", body = Envelope<RecordResponse>),
        (status = 404, description = "No such record for the caller", body = crate::dto::ErrorResponse),
        (status = 409, description = "Already returned", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "records"
)]
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id = parse_id(&id, "record id")?;
    let record = state.db.borrow_repo().return_book(user.id, record_id).await?;

    tracing::info!(user_id = user.id, record_id, "Book returned");
    Ok(Envelope::ok_with_message(
        "book returned",
        RecordResponse::from(record),
    ))
}

#[utoipa::path(
    get,
    path = "/api/records",
    params(RecordListQuery),
    responses(
        (status = 200, description = "The caller's borrow records", body = Envelope<PaginatedData<RecordResponse>>),
        (status = 400, description = "Unknown status", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "records"
)]
pub async fn list_my_records(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<RecordListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = RecordFilter {
        user_id: Some(user.id),
        book_id: None,
        status: parse_status(query.status.as_deref())?,
    };
    let pagination = Pagination::from_raw(query.page.as_deref(), query.page_size.as_deref());

    let page = state.db.borrow_repo().list(filter, pagination).await?;
    Ok(Envelope::ok(PaginatedData::<RecordResponse>::from_page(page)))
}

#[utoipa::path(
    get,
    path = "/api/admin/records",
    params(AdminRecordQuery),
    responses(
        (status = 200, description = "Borrow records of every user", body = Envelope<PaginatedData<RecordResponse>>),
        (status = 400, description = "Invalid filter", body = crate::dto::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_all_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminRecordQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = RecordFilter {
        user_id: parse_optional_id(query.user_id.as_deref(), "user id")?,
        book_id: parse_optional_id(query.book_id.as_deref(), "book id")?,
        status: parse_status(query.status.as_deref())?,
    };
    let pagination = Pagination::from_raw(query.page.as_deref(), query.page_size.as_deref());

    let page = state.db.borrow_repo().list(filter, pagination).await?;
    Ok(Envelope::ok(PaginatedData::<RecordResponse>::from_page(page)))
}

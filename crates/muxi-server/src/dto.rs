use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use muxi_core::game::{CatalogEntry, OwnedEntry};
use muxi_core::models::{Book, BorrowRecord, User};
use muxi_core::pagination::Page;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wrapper around every JSON response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Envelope<T> {
    /// Mirrors the HTTP status code.
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// Success without payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: None,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Envelope without payload, as documented for errors and plain acknowledgements.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

/// One page of a listing.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PaginatedData<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PaginatedData<T> {
    pub fn from_page<U>(page: Page<U>) -> Self
    where
        T: From<U>,
    {
        Self {
            list: page.list.into_iter().map(T::from).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

/// Raw `page`/`page_size` query values; bad input falls back to defaults.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CommonUserData {
    pub user_id: i64,
    pub username: String,
    /// `user` or `admin`.
    pub group: String,
    pub head_image_path: String,
    pub strength_coin: i64,
    pub select_coin: i64,
}

impl From<User> for CommonUserData {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            group: user.group.to_string(),
            head_image_path: user.head_image_path,
            strength_coin: user.strength_coin,
            select_coin: user.select_coin,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthData {
    pub user: CommonUserData,
    pub token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateUsernameRequest {
    pub new_username: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HeadImageResponse {
    pub head_image_path: String,
}

/// Multipart body of `PUT /api/profile/update/headimage`.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct HeadImageForm {
    #[schema(value_type = String, format = Binary)]
    pub new_head_image: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Admin: users
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    /// Exact user id; other filters are ignored when set.
    pub id: Option<String>,
    /// Case-insensitive substring.
    pub username: Option<String>,
    /// `user` or `admin`.
    pub group: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Signed balance changes.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AdjustCoinsRequest {
    #[serde(default)]
    pub strength_coin: Option<i64>,
    #[serde(default)]
    pub select_coin: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GrantRequest {
    /// `achievement`, `skill`, `card` or `item`.
    pub kind: String,
    pub target_id: i64,
    /// Cards and items only, defaults to 1.
    #[serde(default)]
    pub amount: Option<i32>,
}

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BookResponse {
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub summary: String,
    pub cover_path: String,
    pub initial_stock: i32,
    pub stock: i32,
    pub total_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.id,
            title: book.title,
            author: book.author,
            summary: book.summary,
            cover_path: book.cover_path,
            initial_stock: book.initial_stock,
            stock: book.stock,
            total_stock: book.total_stock,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct BookListQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Multipart body of `POST /api/admin/books`.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct CreateBookForm {
    pub title: String,
    pub author: String,
    pub summary: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub cover: Option<Vec<u8>>,
    pub initial_stock: Option<i32>,
}

/// Multipart body of `PUT /api/admin/books/{id}`; every field is optional.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UpdateBookForm {
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub cover: Option<Vec<u8>>,
    pub total_stock: Option<i32>,
}

// ---------------------------------------------------------------------------
// Borrow records
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordResponse {
    pub record_id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_at: DateTime<Utc>,
    pub return_at: Option<DateTime<Utc>>,
    /// `borrowed` or `returned`.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BorrowRecord> for RecordResponse {
    fn from(record: BorrowRecord) -> Self {
        Self {
            record_id: record.id,
            user_id: record.user_id,
            book_id: record.book_id,
            borrow_at: record.borrow_at,
            return_at: record.return_at,
            status: record.status.to_string(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct RecordListQuery {
    /// `borrowed` or `returned`.
    pub status: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct AdminRecordQuery {
    pub user_id: Option<String>,
    pub book_id: Option<String>,
    /// `borrowed` or `returned`.
    pub status: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CatalogEntryResponse {
    pub id: i64,
    pub kind: String,
    pub name: String,
    pub description: String,
    /// Skills only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_level: Option<i32>,
    /// Cards only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CatalogEntry> for CatalogEntryResponse {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind.to_string(),
            name: entry.name,
            description: entry.description,
            max_level: entry.max_level,
            rarity: entry.rarity.map(|r| r.to_string()),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateCatalogEntryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Skills only, defaults to 10.
    #[serde(default)]
    pub max_level: Option<i32>,
    /// Cards only: `common`, `rare`, `epic` or `legendary`.
    #[serde(default)]
    pub rarity: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OwnedEntryResponse {
    pub kind: String,
    /// Catalog entry id.
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    pub acquired_at: DateTime<Utc>,
}

impl From<OwnedEntry> for OwnedEntryResponse {
    fn from(entry: OwnedEntry) -> Self {
        Self {
            kind: entry.kind.to_string(),
            id: entry.entry_id,
            name: entry.name,
            description: entry.description,
            level: entry.level,
            max_level: entry.max_level,
            quantity: entry.quantity,
            rarity: entry.rarity.map(|r| r.to_string()),
            acquired_at: entry.acquired_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SkillUpgradeResponse {
    pub skill: OwnedEntryResponse,
    pub strength_coin: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CardDrawResponse {
    pub card: CatalogEntryResponse,
    pub quantity: i32,
    pub select_coin: i64,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthData {
    /// `ok` or `unavailable`.
    pub database: String,
}

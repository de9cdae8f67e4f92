use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Head image assigned to every new account.
pub const DEFAULT_HEAD_IMAGE_PATH: &str = "static/DefaultHeadImg.jpeg";

/// Cover used when a book is created without one.
pub const DEFAULT_COVER_PATH: &str = "uploads/default.png";

/// Summary used when a book is created without one.
pub const DEFAULT_SUMMARY: &str = "Nothing here yet";

/// Permission group of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    User,
    Admin,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::User => "user",
            Group::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Group::Admin)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Group::User),
            "admin" => Ok(Group::Admin),
            _ => Err(format!("Unknown group: {}", s)),
        }
    }
}

/// A registered account, including the game wallet.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub group: Group,
    pub head_image_path: String,
    /// Currency spent on skill upgrades.
    pub strength_coin: i64,
    /// Currency spent on card draws.
    pub select_coin: i64,
    /// Bumped to revoke every token issued before.
    pub token_version: i64,
    pub password_updated_at: Option<DateTime<Utc>>,
    pub username_updated_at: Option<DateTime<Utc>>,
    pub head_image_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for the admin user listing.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Already sanitised with [`crate::search::sanitize_like_keyword`].
    pub username: Option<String>,
    pub group: Option<Group>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub summary: String,
    pub cover_path: String,
    pub initial_stock: i32,
    /// Copies currently on the shelf.
    pub stock: i32,
    /// Copies owned by the library.
    pub total_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Number of copies currently lent out.
    pub fn borrowed_count(&self) -> i32 {
        self.total_stock - self.stock
    }

    pub fn is_fully_shelved(&self) -> bool {
        self.stock == self.total_stock
    }
}

/// DTO for inserting a new book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub summary: String,
    pub cover_path: String,
    pub initial_stock: i32,
}

/// Partial update of a book; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub cover_path: Option<String>,
    pub total_stock: Option<i32>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.summary.is_none()
            && self.cover_path.is_none()
            && self.total_stock.is_none()
    }
}

/// Filters for the book listing, each already sanitised.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
}

/// Lifecycle of a borrow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
        }
    }
}

impl fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "borrowed" => Ok(BorrowStatus::Borrowed),
            "returned" => Ok(BorrowStatus::Returned),
            _ => Err(format!("Unknown borrow status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BorrowRecord {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_at: DateTime<Utc>,
    pub return_at: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for borrow record listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter {
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    pub status: Option<BorrowStatus>,
}

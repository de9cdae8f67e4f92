pub mod cooldown;
pub mod credentials;
pub mod error;
pub mod game;
pub mod models;
pub mod pagination;
pub mod search;
pub mod storage;

pub use error::AppError;
pub use game::{CatalogEntry, CatalogKind, NewCatalogEntry, OwnedEntry, Rarity};
pub use models::{Book, BorrowRecord, BorrowStatus, Group, User};
pub use pagination::{Page, Pagination};
pub use storage::LocalImageStore;

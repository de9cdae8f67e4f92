pub mod book_repository;
pub mod borrow_repository;
pub mod catalog_repository;
pub mod config;
pub mod database;
mod error;
pub mod inventory_repository;
pub mod user_repository;

pub use book_repository::{BookRepository, BookUpdate};
pub use borrow_repository::BorrowRepository;
pub use catalog_repository::CatalogRepository;
pub use config::DatabaseConfig;
pub use database::Database;
pub use inventory_repository::{CardDraw, InventoryRepository, SkillUpgrade};
pub use user_repository::UserRepository;

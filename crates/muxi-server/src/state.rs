use muxi_core::LocalImageStore;
use muxi_db::Database;

use crate::auth::JwtKeys;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    /// Signing and verification keys for access tokens.
    pub jwt: JwtKeys,
    /// Where uploaded head images and covers are written.
    pub images: LocalImageStore,
}

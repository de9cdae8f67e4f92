use muxi_core::credentials::{hash_password, validate_password, validate_username};
use muxi_core::error::AppError;
use muxi_core::models::Group;
use muxi_db::Database;

/// Create the admin account unless a user with that name already exists.
///
/// Returns true when an account was created. An existing user is left
/// untouched, whatever its group.
pub async fn ensure_admin(db: &Database, username: &str, password: &str) -> Result<bool, AppError> {
    let repo = db.user_repo();
    if repo.find_by_username(username).await?.is_some() {
        tracing::debug!(username, "Admin account already present");
        return Ok(false);
    }

    validate_username(username)?;
    validate_password(password)?;
    let hash = hash_password(password).await?;

    match repo.create(username, &hash, Group::Admin).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, username, "Seeded admin account");
            Ok(true)
        }
        // Another instance seeded it first.
        Err(AppError::Conflict(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

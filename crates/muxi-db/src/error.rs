use muxi_core::AppError;

/// Map a driver error, turning unique violations into [`AppError::Conflict`].
pub(crate) fn map_unique(err: sqlx::Error, conflict_message: &str) -> AppError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        AppError::Conflict(conflict_message.to_string())
    } else {
        db_error(err)
    }
}

pub(crate) fn db_error(err: sqlx::Error) -> AppError {
    AppError::DatabaseError(err.to_string())
}

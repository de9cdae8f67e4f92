use thiserror::Error;

/// Application-wide error types for the MuXi backend.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request input failed validation.
    #[error("Invalid request: {0}")]
    ValidationError(String),

    /// Missing, malformed, expired or revoked credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (wrong group, wrong password).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A profile field was changed again inside its cooldown window.
    #[error("{field} was changed too recently, retry after {retry_after_secs}s")]
    TooSoon {
        field: &'static str,
        retry_after_secs: i64,
    },

    /// Requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// State conflict: duplicates, out of stock, insufficient balance.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request body over the accepted size.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Reading or writing uploaded files failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Hashing or token signing failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true for errors caused by the client rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::ValidationError(_)
                | AppError::Unauthorized(_)
                | AppError::Forbidden(_)
                | AppError::TooSoon { .. }
                | AppError::NotFound(_)
                | AppError::Conflict(_)
                | AppError::PayloadTooLarge(_)
                | AppError::RateLimitExceeded
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

//! Token store errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Token already registered: {0}")]
    DuplicateToken(String),

    #[error("Stored registrations already repeat a token; remove the duplicates before requiring unique tokens")]
    ExistingDuplicates,

    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

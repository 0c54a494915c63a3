//! Error types for the storage layer.

use thiserror::Error;

/// Errors from form and user storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("form not found: {0}")]
    FormNotFound(i64),

    #[error("user not found: {0}")]
    UserNotFound(i64),

    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("session index error: {0}")]
    Session(#[from] formline_session::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

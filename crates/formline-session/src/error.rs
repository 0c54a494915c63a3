//! Error types for session cache operations.

/// Error type for session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing cache rejected or failed an operation.
    #[error("cache error: {0}")]
    Cache(String),

    /// A cached record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;

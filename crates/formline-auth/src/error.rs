//! Error types for identity resolution.

use thiserror::Error;

/// Errors from token verification and OAuth sign-in.
///
/// Every token-verification failure collapses into [`Unauthorized`] with no
/// further detail; callers must not be able to distinguish a bad signature
/// from an expired or malformed credential.
///
/// [`Unauthorized`]: AuthError::Unauthorized
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("token issuance failed: {0}")]
    Issuance(String),

    #[error("provider exchange failed: {0}")]
    Provider(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Store(#[from] formline_store::StoreError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use formline_auth::AuthError;
use formline_store::StoreError;
use formline_types::ValidationError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Authentication or authorization failed. Carries no detail so that
    /// callers cannot distinguish a bad token from an insufficient role.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A request field failed to parse.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage or an upstream dependency is unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::FormNotFound(id) => ServerError::NotFound(format!("form {id}")),
            StoreError::UserNotFound(id) => ServerError::NotFound(format!("user {id}")),
            StoreError::DuplicateUsername(name) => {
                ServerError::BadRequest(format!("username already taken: {name}"))
            }
            StoreError::Sqlite(e) => ServerError::Unavailable(e.to_string()),
            StoreError::Migration(msg) => ServerError::Unavailable(msg),
            StoreError::Session(e) => ServerError::Unavailable(e.to_string()),
        }
    }
}

impl From<formline_session::Error> for ServerError {
    fn from(e: formline_session::Error) -> Self {
        ServerError::Unavailable(e.to_string())
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => ServerError::Unauthorized,
            AuthError::Issuance(msg) => ServerError::Internal(msg),
            AuthError::Provider(msg) | AuthError::Network(msg) => ServerError::Unavailable(msg),
            AuthError::Store(e) => e.into(),
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::BadRequest(_) | ServerError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ServerError::Unavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

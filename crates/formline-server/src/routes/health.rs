//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status, `"ok"` or `"degraded"`.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Selected storage backend, `"sqlite"` or `"memory"`.
    pub storage: String,
    /// True when the process fell back to in-memory storage at startup.
    pub degraded: bool,
}

/// Simple health check (no auth required).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.storage.degraded {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.storage.backend.to_string(),
        degraded: state.storage.degraded,
    })
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

//! Session lifecycle endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use formline_session::Session;

use crate::error::Result;
use crate::state::AppState;

/// GET /api/v1/session - mint a fresh session.
pub async fn create_session_handler(State(state): State<AppState>) -> Result<Json<Session>> {
    let id = Uuid::new_v4().to_string();
    let session = state.sessions.get_or_create(&id).await?;
    Ok(Json(session))
}

/// Validity check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionValidResponse {
    pub session_id: String,
    pub valid: bool,
}

/// GET /api/v1/session/{id}/valid - check a session without refreshing its TTL.
pub async fn session_valid_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionValidResponse>> {
    let valid = state.sessions.exists(&id).await?;
    Ok(Json(SessionValidResponse {
        session_id: id,
        valid,
    }))
}

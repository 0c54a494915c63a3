//! Skill listing and invocation endpoints.
//!
//! This is the seam an external conversational runtime drives: it lists the
//! skills with their JSON Schema parameters and posts the arguments the
//! model filled in. Invocation results are plain strings for the
//! conversation, even when the skill failed internally.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use crate::auth::extract_token;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// One registered skill.
#[derive(Debug, Serialize, Deserialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// GET /api/v1/skills - list registered skills with their schemas.
pub async fn list_skills_handler(State(state): State<AppState>) -> Json<Vec<SkillInfo>> {
    let mut skills: Vec<SkillInfo> = state
        .skills
        .iter()
        .map(|skill| SkillInfo {
            name: skill.name().to_string(),
            description: skill.description().to_string(),
            parameters: skill.parameters(),
        })
        .collect();
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    Json(skills)
}

/// Skill invocation response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub result: String,
}

/// POST /api/v1/skills/{name}/invoke - run a skill with model-filled args.
///
/// The caller's token, if any, is forwarded so skills can attribute their
/// side effects; an absent or stale token degrades to anonymous rather
/// than failing the call.
pub async fn invoke_skill_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(args): Json<serde_json::Value>,
) -> Result<Json<InvokeResponse>> {
    let skill = state
        .skills
        .get(&name)
        .ok_or_else(|| ServerError::NotFound(format!("skill {name}")))?;

    let credential = extract_token(&headers, &state.config);
    let result = skill.invoke(args, credential.as_deref()).await;
    Ok(Json(InvokeResponse { result }))
}

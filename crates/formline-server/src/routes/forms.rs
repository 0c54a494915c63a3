//! Form listing and state transition endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use formline_store::{DEFAULT_PAGE_SIZE, FormQuery};
use formline_types::{FormState, FormView};

use crate::error::Result;
use crate::state::AppState;

/// GET /api/v1/forms/session/{session_id} - forms logged in one session.
///
/// The session id itself is the capability here; knowing it grants read
/// access to that session's forms and nothing else.
pub async fn session_forms_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<FormView>>> {
    let ids = state.index.form_ids(&session_id).await?;
    let forms = state.forms.get_by_ids(&ids).await?;
    let views = state.forms.to_views(&forms).await?;
    Ok(Json(views))
}

/// Raw query parameters for the admin listing.
///
/// Enum fields stay strings until [`into_query`](Self::into_query) so an
/// unparseable value turns into a 400 before any storage read happens.
#[derive(Debug, Default, Deserialize)]
pub struct AdminFormsParams {
    pub state: Option<String>,
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub keyword: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl AdminFormsParams {
    fn into_query(self) -> Result<FormQuery> {
        let mut query = FormQuery::new().with_page(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(s) = self.state {
            query = query.with_state(s.parse()?);
        }
        if let Some(c) = self.category {
            query = query.with_category(c.parse()?);
        }
        if let Some(u) = self.urgency {
            query = query.with_urgency(u.parse()?);
        }
        if let Some(k) = self.keyword {
            query = query.with_keyword(k);
        }
        Ok(query)
    }
}

/// GET /api/v1/forms/admin - filtered, paged listing across all sessions.
pub async fn admin_forms_handler(
    State(state): State<AppState>,
    Query(params): Query<AdminFormsParams>,
) -> Result<Json<Vec<FormView>>> {
    let query = params.into_query()?;
    Ok(Json(state.forms.query(&query).await?))
}

/// PUT /api/v1/forms/{id}/state - transition a form, body is the new state.
pub async fn update_state_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(new_state): Json<String>,
) -> Result<StatusCode> {
    let new_state: FormState = new_state.parse()?;
    let form = state.forms.update_state(id, new_state).await?;

    let views = state.forms.to_views(std::slice::from_ref(&form)).await?;
    let view = views
        .into_iter()
        .next()
        .unwrap_or_else(|| FormView::project(&form, None));
    state.hub.broadcast_state_change(&view);

    Ok(StatusCode::NO_CONTENT)
}

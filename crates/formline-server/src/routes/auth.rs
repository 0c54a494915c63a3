//! OAuth callback and logout endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use formline_auth::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, TokenKind};
use formline_store::ExternalProvider;

use crate::error::{Result, ServerError};
use crate::state::AppState;

fn set_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn append_cookie(headers: &mut HeaderMap, cookie: &str) -> Result<()> {
    let value = cookie
        .parse()
        .map_err(|_| ServerError::Internal("cookie header encoding failed".to_string()))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

/// OAuth callback query parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
}

/// OAuth callback response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub username: String,
}

/// GET /api/v1/auth/{provider}/callback - complete an OAuth sign-in.
///
/// On success the access and refresh tokens land in HttpOnly cookies; the
/// body only carries the username for display.
pub async fn oauth_callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse> {
    let provider: ExternalProvider = provider.parse()?;

    let Some((user, access)) = state.resolver.sign_in_external(provider, &params.code).await?
    else {
        // The provider answered but withheld the profile; treat it as the
        // user declining, not as a server fault.
        return Err(ServerError::BadRequest(
            "the identity provider did not share a usable profile".to_string(),
        ));
    };
    let refresh = state.resolver.issue_token(&user, TokenKind::Refresh)?;

    let config = &state.config;
    let mut headers = HeaderMap::new();
    append_cookie(
        &mut headers,
        &set_cookie(
            &config.access_cookie,
            &access,
            DEFAULT_ACCESS_TTL.as_secs(),
            config.secure_cookies,
        ),
    )?;
    append_cookie(
        &mut headers,
        &set_cookie(
            &config.refresh_cookie,
            &refresh,
            DEFAULT_REFRESH_TTL.as_secs(),
            config.secure_cookies,
        ),
    )?;

    Ok((
        headers,
        Json(CallbackResponse {
            username: user.username,
        }),
    ))
}

/// POST /api/v1/auth/refresh - exchange the refresh cookie for a new access
/// token.
///
/// The refresh cookie itself is left untouched; the client keeps refreshing
/// against it until it expires, then signs in again.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let refresh = crate::auth::cookie_value(&headers, &state.config.refresh_cookie)
        .ok_or(ServerError::Unauthorized)?;
    let (user, access) = state.resolver.refresh(&refresh).await?;

    let config = &state.config;
    let mut response_headers = HeaderMap::new();
    append_cookie(
        &mut response_headers,
        &set_cookie(
            &config.access_cookie,
            &access,
            DEFAULT_ACCESS_TTL.as_secs(),
            config.secure_cookies,
        ),
    )?;

    Ok((
        response_headers,
        Json(CallbackResponse {
            username: user.username,
        }),
    ))
}

/// Logout query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutParams {
    pub session_id: Option<String>,
}

/// POST /api/v1/auth/logout - clear token cookies and drop the session.
pub async fn logout_handler(
    State(state): State<AppState>,
    Query(params): Query<LogoutParams>,
) -> Result<impl IntoResponse> {
    if let Some(session_id) = params.session_id {
        state.sessions.remove(&session_id).await?;
    }

    let config = &state.config;
    let mut headers = HeaderMap::new();
    append_cookie(
        &mut headers,
        &set_cookie(&config.access_cookie, "", 0, config.secure_cookies),
    )?;
    append_cookie(
        &mut headers,
        &set_cookie(&config.refresh_cookie, "", 0, config.secure_cookies),
    )?;

    Ok((headers, StatusCode::NO_CONTENT))
}

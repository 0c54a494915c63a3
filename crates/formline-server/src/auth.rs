//! Request authentication.
//!
//! Tokens arrive either as a `Bearer` authorization header or in the
//! configured access cookie. Admin-gated routes run behind
//! [`admin_middleware`]; every failure on that path is the same 401 so a
//! probing client learns nothing about why it was turned away.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use formline_auth::Identity;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::state::AppState;

/// Read a single cookie value from the `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Pull the access token from a request. Bearer header wins over the cookie.
pub fn extract_token(headers: &HeaderMap, config: &ServerConfig) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        && let Some(token) = auth.strip_prefix("Bearer ")
    {
        return Some(token.to_string());
    }
    cookie_value(headers, &config.access_cookie)
}

/// Middleware for admin-only routes.
///
/// Verifies the access token, requires the admin role, and injects the
/// resolved [`Identity`] into request extensions.
pub async fn admin_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let identity = admin_identity(&state, request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Resolve an admin identity from request headers, or fail with 401.
pub fn admin_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, ServerError> {
    let token = extract_token(headers, &state.config).ok_or(ServerError::Unauthorized)?;
    let identity = state.resolver.resolve_token(&token)?;
    if !identity.is_admin() {
        return Err(ServerError::Unauthorized);
    }
    Ok(identity)
}

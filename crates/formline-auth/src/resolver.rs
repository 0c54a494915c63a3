//! Ties token verification and OAuth sign-in to the user store.

use std::sync::Arc;

use tracing::info;

use formline_store::{ExternalProvider, StoreError, UserStore};
use formline_types::User;

use crate::error::{AuthError, Result};
use crate::oauth::OAuthClient;
use crate::token::{Identity, TokenKind, TokenService};

/// Resolves credentials into identities.
///
/// This is the single entry point the serving path uses for authentication:
/// bearer/cookie tokens go through [`resolve_token`], OAuth callbacks through
/// [`sign_in_external`].
///
/// [`resolve_token`]: IdentityResolver::resolve_token
/// [`sign_in_external`]: IdentityResolver::sign_in_external
pub struct IdentityResolver {
    tokens: TokenService,
    oauth: OAuthClient,
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(tokens: TokenService, oauth: OAuthClient, users: Arc<dyn UserStore>) -> Self {
        Self {
            tokens,
            oauth,
            users,
        }
    }

    /// Verify an access token and return the identity it carries.
    pub fn resolve_token(&self, token: &str) -> Result<Identity> {
        self.tokens.verify(token, TokenKind::Access)
    }

    /// Complete an OAuth sign-in: exchange the code, find or create the
    /// account, and issue a fresh access token.
    ///
    /// `Ok(None)` means the provider answered with a profile too sparse to
    /// bind an account; callers treat it as a declined sign-in, not an error.
    pub async fn sign_in_external(
        &self,
        provider: ExternalProvider,
        code: &str,
    ) -> Result<Option<(User, String)>> {
        let Some(profile) = self.oauth.exchange_code(provider, code).await? else {
            return Ok(None);
        };
        let user = self
            .users
            .get_or_create_external(
                provider,
                &profile.id,
                &profile.username,
                profile.email.as_deref(),
            )
            .await?;

        info!(user_id = user.id, provider = %provider, "external sign-in completed");
        let token = self.tokens.issue(&user, TokenKind::Access)?;
        Ok(Some((user, token)))
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// The account is re-read from the store, so the new access token picks
    /// up role changes made since sign-in. A refresh for a deleted account
    /// collapses into `Unauthorized` like any other bad credential.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, String)> {
        let identity = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        let user = self
            .users
            .get_by_id(identity.user_id)
            .await
            .map_err(|e| match e {
                StoreError::UserNotFound(_) => AuthError::Unauthorized,
                other => AuthError::Store(other),
            })?;

        let token = self.tokens.issue(&user, TokenKind::Access)?;
        Ok((user, token))
    }

    /// Issue a token for an already-authenticated user.
    pub fn issue_token(&self, user: &User, kind: TokenKind) -> Result<String> {
        self.tokens.issue(user, kind)
    }
}

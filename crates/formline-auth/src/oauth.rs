//! OAuth 2.0 authorization-code exchange against GitHub and Google.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use formline_store::ExternalProvider;

use crate::config::ProviderConfig;
use crate::error::{AuthError, Result};

/// Profile fields fetched from a provider after code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    /// Provider-scoped stable account id.
    pub id: String,
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GitHubProfile {
    id: Option<i64>,
    login: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    sub: Option<String>,
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// HTTP client for the provider side of OAuth sign-in.
pub struct OAuthClient {
    http: reqwest::Client,
    github: Option<ProviderConfig>,
    google: Option<ProviderConfig>,
}

impl OAuthClient {
    pub fn new(github: Option<ProviderConfig>, google: Option<ProviderConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("formline")
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        Ok(Self {
            http,
            github,
            google,
        })
    }

    fn provider_config(&self, provider: ExternalProvider) -> Result<&ProviderConfig> {
        let config = match provider {
            ExternalProvider::GitHub => self.github.as_ref(),
            ExternalProvider::Google => self.google.as_ref(),
        };
        config.ok_or_else(|| AuthError::Provider(format!("{provider} sign-in is not configured")))
    }

    /// Exchange an authorization code and fetch the account profile.
    ///
    /// Returns `Ok(None)` when the provider answers but its profile lacks the
    /// fields needed to bind an account.
    pub async fn exchange_code(
        &self,
        provider: ExternalProvider,
        code: &str,
    ) -> Result<Option<ExternalProfile>> {
        let config = self.provider_config(provider)?;

        let params = [
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(&config.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("token exchange request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            debug!(provider = %provider, %status, "token exchange rejected");
            return Err(AuthError::Provider(format!(
                "token exchange failed with status {status}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("failed to parse token response: {e}")))?;

        self.fetch_profile(provider, config, &tokens.access_token)
            .await
    }

    async fn fetch_profile(
        &self,
        provider: ExternalProvider,
        config: &ProviderConfig,
        access_token: &str,
    ) -> Result<Option<ExternalProfile>> {
        let response = self
            .http
            .get(&config.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("profile request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "profile fetch failed with status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        parse_profile(provider, &body)
    }
}

fn parse_profile(provider: ExternalProvider, body: &str) -> Result<Option<ExternalProfile>> {
    match provider {
        ExternalProvider::GitHub => {
            let profile: GitHubProfile = serde_json::from_str(body)
                .map_err(|e| AuthError::Provider(format!("malformed GitHub profile: {e}")))?;
            let (Some(id), Some(login)) = (profile.id, profile.login) else {
                debug!("GitHub profile missing id or login");
                return Ok(None);
            };
            Ok(Some(ExternalProfile {
                id: id.to_string(),
                username: login,
                email: profile.email,
            }))
        }
        ExternalProvider::Google => {
            let profile: GoogleProfile = serde_json::from_str(body)
                .map_err(|e| AuthError::Provider(format!("malformed Google profile: {e}")))?;
            let Some(sub) = profile.sub else {
                debug!("Google profile missing subject id");
                return Ok(None);
            };
            // Google accounts have no login handle; fall back to the email's
            // local part, then to the display name.
            let username = profile
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(String::from)
                .or(profile.name)
                .unwrap_or_else(|| format!("user-{sub}"));
            Ok(Some(ExternalProfile {
                id: sub,
                username,
                email: profile.email,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_profile() {
        let body = r#"{"id": 583231, "login": "octocat", "email": null, "name": "The Octocat"}"#;
        let profile = parse_profile(ExternalProvider::GitHub, body).unwrap().unwrap();
        assert_eq!(profile.id, "583231");
        assert_eq!(profile.username, "octocat");
        assert!(profile.email.is_none());
    }

    #[test]
    fn test_parse_google_profile_uses_email_local_part() {
        let body = r#"{"sub": "110169484474386276334", "email": "ada@example.com", "name": "Ada L"}"#;
        let profile = parse_profile(ExternalProvider::Google, body).unwrap().unwrap();
        assert_eq!(profile.id, "110169484474386276334");
        assert_eq!(profile.username, "ada");
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_parse_google_profile_without_email() {
        let body = r#"{"sub": "12345", "name": "Mystery"}"#;
        let profile = parse_profile(ExternalProvider::Google, body).unwrap().unwrap();
        assert_eq!(profile.username, "Mystery");
        assert!(profile.email.is_none());
    }

    #[test]
    fn test_incomplete_profile_resolves_to_none() {
        assert!(parse_profile(ExternalProvider::GitHub, "{}").unwrap().is_none());
        assert!(
            parse_profile(ExternalProvider::Google, r#"{"email": "x@y.z"}"#)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_non_json_profile_is_provider_error() {
        let err = parse_profile(ExternalProvider::GitHub, "<html>").unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let client = OAuthClient::new(None, None).unwrap();
        let err = client
            .exchange_code(ExternalProvider::GitHub, "code")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }
}

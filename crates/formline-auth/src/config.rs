//! Configuration for token issuance and OAuth providers.

use std::time::Duration;

/// Default access token lifetime (60 minutes).
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(60 * 60);

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Settings for signing and validating session tokens.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC signing secret. Tokens signed with a different secret fail
    /// verification.
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "formline".to_string(),
            audience: "formline-clients".to_string(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }
}

/// Endpoints and credentials for one OAuth provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub profile_url: String,
    pub redirect_uri: String,
}

impl ProviderConfig {
    /// GitHub endpoints with the given app credentials.
    pub fn github(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            profile_url: "https://api.github.com/user".to_string(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Google endpoints with the given app credentials.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            profile_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

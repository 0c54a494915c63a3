//! Signed session tokens.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use formline_types::{Role, User};

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};

/// Which lifetime and purpose a token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// The identity a verified token resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    jti: String,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    config: AuthConfig,
}

impl TokenService {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            config,
        }
    }

    /// Issue a token for a user.
    pub fn issue(&self, user: &User, kind: TokenKind) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.config.access_ttl,
            TokenKind::Refresh => self.config.refresh_ttl,
        };
        let now = Utc::now();

        let claims = Claims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1)))
                .timestamp(),
            kind: kind.as_str().to_string(),
            // Refresh tokens carry no role; authorization always flows
            // through a fresh access token.
            role: match kind {
                TokenKind::Access => Some(user.role.as_str().to_string()),
                TokenKind::Refresh => None,
            },
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issuance(e.to_string()))
    }

    /// Verify a token of the expected kind and resolve its identity.
    ///
    /// Any failure (bad signature, expiry, wrong issuer or audience, wrong
    /// kind, malformed claims) yields the same `Unauthorized` error.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(reason = %e, "token verification failed");
            AuthError::Unauthorized
        })?;

        if data.claims.kind != kind.as_str() {
            debug!(kind = %data.claims.kind, "token kind mismatch");
            return Err(AuthError::Unauthorized);
        }

        let user_id: i64 = data.claims.sub.parse().map_err(|_| AuthError::Unauthorized)?;
        let role = match data.claims.role.as_deref() {
            Some(r) => r.parse().map_err(|_| AuthError::Unauthorized)?,
            None => Role::User,
        };

        Ok(Identity { user_id, role })
    }
}

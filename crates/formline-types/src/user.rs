//! User accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Authorization role carried inside access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Admin => "Admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("User") {
            Ok(Self::User)
        } else if s.eq_ignore_ascii_case("Admin") {
            Ok(Self::Admin)
        } else {
            Err(ValidationError::new("role", s))
        }
    }
}

/// A registered user.
///
/// Created at signup or on first external-identity login; usernames are
/// unique, external accounts may have no password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub github_id: Option<String>,
    pub google_id: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user record with no external identity.
    pub fn new(username: impl Into<String>, password_hash: Option<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            password_hash,
            role: Role::User,
            github_id: None,
            google_id: None,
            email: None,
            created_at: Utc::now(),
        }
    }
}

//! Identity resolution: session tokens and OAuth sign-in.
//!
//! Access is proven with short-lived HS256 tokens carried in a cookie. New
//! accounts come from OAuth code exchange against GitHub or Google; the
//! provider's stable account id binds the external identity to a local user.

mod config;
mod error;
mod oauth;
mod resolver;
mod token;

pub use config::{AuthConfig, DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, ProviderConfig};
pub use error::{AuthError, Result};
pub use oauth::{ExternalProfile, OAuthClient};
pub use resolver::IdentityResolver;
pub use token::{Identity, TokenKind, TokenService};

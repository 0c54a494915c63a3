//! Server configuration.

use std::net::SocketAddr;

/// Default cookie name for the access token.
pub const DEFAULT_ACCESS_COOKIE: &str = "AuthToken";

/// Default cookie name for the refresh token.
pub const DEFAULT_REFRESH_COOKIE: &str = "RefreshToken";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Cookie name the access token is read from and written to.
    pub access_cookie: String,

    /// Cookie name the refresh token is written to.
    pub refresh_cookie: String,

    /// CORS allowed origins (empty = same-origin only).
    pub cors_origins: Vec<String>,

    /// Mark issued cookies `Secure`. Off by default for plain-HTTP dev setups.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("valid default address"),
            access_cookie: DEFAULT_ACCESS_COOKIE.to_string(),
            refresh_cookie: DEFAULT_REFRESH_COOKIE.to_string(),
            cors_origins: Vec::new(),
            secure_cookies: false,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the cookie names for access and refresh tokens.
    pub fn with_cookie_names(
        mut self,
        access: impl Into<String>,
        refresh: impl Into<String>,
    ) -> Self {
        self.access_cookie = access.into();
        self.refresh_cookie = refresh.into();
        self
    }

    /// Set CORS allowed origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Mark issued cookies `Secure`.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}

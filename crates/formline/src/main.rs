//! Formline - support form service with live fan-out.
//!
//! Main entry point: wires the cache, storage failover, auth, and hub
//! together and runs the HTTP/WebSocket server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use formline_auth::{AuthConfig, IdentityResolver, OAuthClient, ProviderConfig, TokenService};
use formline_hub::FanoutHub;
use formline_server::{AppState, DEFAULT_PROBE_TIMEOUT, Server, ServerConfig, select_backends};
use formline_session::{CacheConfig, FormIndex, MemoryCacheBackend, SessionStore};
use formline_skill::{LogFormSkill, SkillRegistry};

/// Formline - support form service with live fan-out
#[derive(Parser)]
#[command(name = "formline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to bind the server to
    #[arg(long, env = "FORMLINE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// SQLite database path
    #[arg(long, env = "FORMLINE_DB", default_value = "formline.db")]
    pub db: PathBuf,

    /// Skip SQLite entirely and run on in-memory storage
    #[arg(long)]
    pub in_memory: bool,

    /// HMAC secret for session tokens
    #[arg(long, env = "FORMLINE_JWT_SECRET")]
    pub jwt_secret: String,

    /// Session idle lifetime in minutes
    #[arg(long, env = "FORMLINE_SESSION_TTL_MINUTES", default_value_t = 120)]
    pub session_ttl_minutes: u64,

    /// GitHub OAuth app client id
    #[arg(long, env = "FORMLINE_GITHUB_CLIENT_ID")]
    pub github_client_id: Option<String>,

    /// GitHub OAuth app client secret
    #[arg(long, env = "FORMLINE_GITHUB_CLIENT_SECRET")]
    pub github_client_secret: Option<String>,

    /// Google OAuth app client id
    #[arg(long, env = "FORMLINE_GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth app client secret
    #[arg(long, env = "FORMLINE_GOOGLE_CLIENT_SECRET")]
    pub google_client_secret: Option<String>,

    /// Public base URL used for OAuth redirect URIs
    #[arg(long, env = "FORMLINE_PUBLIC_URL", default_value = "http://localhost:8080")]
    pub public_url: String,

    /// CORS allowed origin (repeatable)
    #[arg(long = "cors-origin", env = "FORMLINE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Mark issued cookies Secure (requires HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Directory for rotating JSON log files
    #[arg(long, env = "FORMLINE_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn provider(
        &self,
        id: &Option<String>,
        secret: &Option<String>,
        name: &str,
    ) -> Option<(String, String, String)> {
        match (id, secret) {
            (Some(id), Some(secret)) => Some((
                id.clone(),
                secret.clone(),
                format!("{}/api/v1/auth/{name}/callback", self.public_url),
            )),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "formline=debug,formline_server=debug,formline_store=debug,formline_auth=debug,\
         formline_session=debug,formline_hub=debug,formline_skill=debug,info"
    } else {
        "formline=info,formline_server=info,formline_store=info,formline_auth=info,\
         formline_session=info,formline_hub=info,formline_skill=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily(&cli.log_dir, "formline.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "formline=trace,formline_server=trace,formline_store=trace,\
                     formline_auth=trace,formline_session=trace,formline_hub=trace,\
                     formline_skill=trace,info",
                )),
        )
        .init();

    // Session cache: one backend shared by the session store and the
    // per-session form index so both slide on the same TTL clock.
    let cache_config =
        CacheConfig::new().with_ttl(Duration::from_secs(cli.session_ttl_minutes * 60));
    let cache = Arc::new(MemoryCacheBackend::new(cache_config));
    let sessions = SessionStore::new(cache.clone());
    let index = FormIndex::new(cache);

    // Storage: probed once, fixed for the process lifetime.
    let db_path = if cli.in_memory {
        None
    } else {
        Some(cli.db.clone())
    };
    let backends = select_backends(db_path, index.clone(), DEFAULT_PROBE_TIMEOUT).await;

    // Auth: token service plus whichever OAuth providers are configured.
    let tokens = TokenService::new(AuthConfig::new(&cli.jwt_secret));
    let github = cli
        .provider(&cli.github_client_id, &cli.github_client_secret, "github")
        .map(|(id, secret, redirect)| ProviderConfig::github(id, secret, redirect));
    let google = cli
        .provider(&cli.google_client_id, &cli.google_client_secret, "google")
        .map(|(id, secret, redirect)| ProviderConfig::google(id, secret, redirect));
    let oauth = OAuthClient::new(github, google)?;
    let resolver = Arc::new(IdentityResolver::new(tokens, oauth, backends.users.clone()));

    let hub = Arc::new(FanoutHub::new());

    // The one skill the conversational runtime drives today.
    let mut skills = SkillRegistry::new();
    skills.register(LogFormSkill::new(
        sessions.clone(),
        backends.forms.clone(),
        resolver.clone(),
        hub.clone(),
    ));

    let server_config = ServerConfig::new()
        .with_bind_address(cli.bind)
        .with_cors_origins(cli.cors_origins)
        .with_secure_cookies(cli.secure_cookies);

    info!(
        bind = %server_config.bind_address,
        storage = backends.status.backend,
        session_ttl_minutes = cli.session_ttl_minutes,
        "formline starting"
    );

    let state = AppState::new(server_config, sessions, index, backends, resolver, hub, skills);
    Server::new(state).run().await?;

    Ok(())
}

//! HTTP API and WebSocket hubs for Formline.
//!
//! This crate is the network surface over the form pipeline: REST routes
//! for sessions and forms, WebSocket hubs for live delivery, and the
//! startup failover that decides which storage backend the process runs on.
//!
//! # Example
//!
//! ```ignore
//! use formline_server::{AppState, Server, ServerConfig, failover};
//!
//! let backends = failover::select_backends(db_path, index.clone(), timeout).await;
//! let state = AppState::new(config, sessions, index, backends, resolver, hub, skills);
//! Server::new(state).run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod failover;
pub mod routes;
pub mod state;

pub use config::{DEFAULT_ACCESS_COOKIE, DEFAULT_REFRESH_COOKIE, ServerConfig};
pub use error::{ErrorResponse, Result, ServerError};
pub use failover::{Backends, DEFAULT_PROBE_TIMEOUT, StorageStatus, select_backends};
pub use routes::HealthResponse;
pub use state::AppState;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// The Formline HTTP/WebSocket server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::get;

        Router::new()
            // Health (no auth required)
            .merge(routes::health_routes())
            // WebSocket hubs; the admin hub authenticates before upgrading
            .route("/hubs/forms", get(routes::forms_hub_handler))
            .route("/hubs/admin", get(routes::admin_hub_handler))
            .nest("/api/v1", self.api_routes())
            .layer(cors_layer(&self.state.config))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes (v1).
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post, put};

        let admin = Router::new()
            .route("/forms/admin", get(routes::admin_forms_handler))
            .route("/forms/{id}/state", put(routes::update_state_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::admin_middleware,
            ));

        Router::new()
            .route(
                "/forms/session/{session_id}",
                get(routes::session_forms_handler),
            )
            .route("/session", get(routes::create_session_handler))
            .route("/session/{id}/valid", get(routes::session_valid_handler))
            .route("/skills", get(routes::list_skills_handler))
            .route(
                "/skills/{name}/invoke",
                post(routes::invoke_skill_handler),
            )
            .route("/auth/refresh", post(routes::refresh_handler))
            .route("/auth/logout", post(routes::logout_handler))
            .route(
                "/auth/{provider}/callback",
                get(routes::oauth_callback_handler),
            )
            .merge(admin)
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        let router = self.router();

        info!(
            storage = self.state.storage.backend,
            degraded = self.state.storage.degraded,
            "Starting server on {}",
            addr
        );

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))?;

        Ok(())
    }
}

/// Build the CORS layer from configured origins.
///
/// Cookies only flow cross-origin with credentials allowed, which in turn
/// requires an explicit origin list; with no origins configured the layer
/// is a no-op and the API is same-origin only.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use formline_auth::{
        AuthConfig, IdentityResolver, OAuthClient, TokenKind, TokenService,
    };
    use formline_hub::{FanoutHub, HubEvent};
    use formline_session::{CacheConfig, FormIndex, MemoryCacheBackend, SessionStore};
    use formline_skill::{LogFormSkill, SkillRegistry};
    use formline_store::{FormsRepository, MemoryStore, UserStore};
    use formline_types::{Form, FormCategory, FormState, FormUrgency, Role, User};

    struct Fixture {
        state: AppState,
        tokens: TokenService,
    }

    impl Fixture {
        fn router(&self) -> Router {
            Server::new(self.state.clone()).router()
        }

        fn admin_token(&self) -> String {
            let mut user = User::new("root", None);
            user.id = 99;
            user.role = Role::Admin;
            self.tokens.issue(&user, TokenKind::Access).unwrap()
        }

        fn user_token(&self) -> String {
            let mut user = User::new("plain", None);
            user.id = 100;
            self.tokens.issue(&user, TokenKind::Access).unwrap()
        }

        async fn seed_form(&self, description: &str, urgency: FormUrgency, session: &str) -> Form {
            let form = Form::new(description, FormCategory::General, urgency, None);
            self.state.forms.save(form, Some(session)).await.unwrap()
        }
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(MemoryCacheBackend::new(CacheConfig::new()));
        let sessions = SessionStore::new(cache.clone());
        let index = FormIndex::new(cache);

        let store = Arc::new(MemoryStore::new(index.clone()));
        let users: Arc<dyn UserStore> = store.clone();
        let backends = Backends {
            forms: store.clone() as Arc<dyn FormsRepository>,
            users: users.clone(),
            status: StorageStatus {
                backend: "memory",
                degraded: false,
            },
        };

        let tokens = TokenService::new(AuthConfig::new("test-secret"));
        let resolver = Arc::new(IdentityResolver::new(
            tokens.clone(),
            OAuthClient::new(None, None).unwrap(),
            users,
        ));

        let hub = Arc::new(FanoutHub::new());
        let mut skills = SkillRegistry::new();
        skills.register(LogFormSkill::new(
            sessions.clone(),
            store as Arc<dyn FormsRepository>,
            resolver.clone(),
            hub.clone(),
        ));

        let state = AppState::new(
            ServerConfig::new(),
            sessions,
            index,
            backends,
            resolver,
            hub,
            skills,
        );
        Fixture { state, tokens }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_storage() {
        let fx = fixture();
        let response = fx.router().oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.storage, "memory");
        assert!(!health.degraded);
        assert!(!health.version.is_empty());
    }

    #[tokio::test]
    async fn test_session_mint_and_validate() {
        let fx = fixture();

        let response = fx.router().oneshot(get("/api/v1/session")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session = body_json(response).await;
        let id = session["id"].as_str().unwrap().to_string();

        let response = fx
            .router()
            .oneshot(get(&format!("/api/v1/session/{id}/valid")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["valid"], true);

        let response = fx
            .router()
            .oneshot(get("/api/v1/session/no-such-session/valid"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["valid"], false);
    }

    #[tokio::test]
    async fn test_session_forms_lists_only_that_session() {
        let fx = fixture();
        fx.seed_form("mine", FormUrgency::Low, "sess-a").await;
        fx.seed_form("theirs", FormUrgency::Low, "sess-b").await;

        let response = fx
            .router()
            .oneshot(get("/api/v1/forms/session/sess-a"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let views = body_json(response).await;
        assert_eq!(views.as_array().unwrap().len(), 1);
        assert_eq!(views[0]["description"], "mine");

        // Unknown session is just an empty list, not an error.
        let response = fx
            .router()
            .oneshot(get("/api/v1/forms/session/unknown"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_admin_forms_requires_admin() {
        let fx = fixture();

        // No credentials at all.
        let response = fx
            .router()
            .oneshot(get("/api/v1/forms/admin"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // A valid token without the admin role gets the same answer.
        let request = Request::builder()
            .uri("/api/v1/forms/admin")
            .header("Authorization", format!("Bearer {}", fx.user_token()))
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_forms_filters_and_rejects_bad_enums() {
        let fx = fixture();
        fx.seed_form("printer on fire", FormUrgency::Critical, "s1").await;
        fx.seed_form("minor nit", FormUrgency::Low, "s2").await;
        let token = fx.admin_token();

        let request = Request::builder()
            .uri("/api/v1/forms/admin?urgency=Critical")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let views = body_json(response).await;
        assert_eq!(views.as_array().unwrap().len(), 1);
        assert_eq!(views[0]["description"], "printer on fire");

        let request = Request::builder()
            .uri("/api/v1/forms/admin?urgency=apocalyptic")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_token_accepted_from_cookie() {
        let fx = fixture();
        let token = fx.admin_token();

        let request = Request::builder()
            .uri("/api/v1/forms/admin")
            .header("Cookie", format!("AuthToken={token}"))
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_state_broadcasts_to_admins() {
        let fx = fixture();
        let form = fx.seed_form("stuck order", FormUrgency::High, "s1").await;
        let (_conn, mut admin_rx) = fx.state.hub.join_admins();

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/forms/{}/state", form.id))
            .header("Authorization", format!("Bearer {}", fx.admin_token()))
            .header("Content-Type", "application/json")
            .body(Body::from("\"Closed\""))
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let updated = fx.state.forms.get_by_id(form.id).await.unwrap();
        assert_eq!(updated.state, FormState::Closed);

        match admin_rx.try_recv().unwrap() {
            HubEvent::FormStateChanged { form: view } => {
                assert_eq!(view.id, form.id);
                assert_eq!(view.state, FormState::Closed);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_state_missing_form_is_404() {
        let fx = fixture();

        let request = Request::builder()
            .method("PUT")
            .uri("/api/v1/forms/999/state")
            .header("Authorization", format!("Bearer {}", fx.admin_token()))
            .header("Content-Type", "application/json")
            .body(Body::from("\"Closed\""))
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_state_rejects_unknown_state() {
        let fx = fixture();
        let form = fx.seed_form("open form", FormUrgency::Low, "s1").await;

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/forms/{}/state", form.id))
            .header("Authorization", format!("Bearer {}", fx.admin_token()))
            .header("Content-Type", "application/json")
            .body(Body::from("\"Resolved-ish\""))
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unchanged = fx.state.forms.get_by_id(form.id).await.unwrap();
        assert_eq!(unchanged.state, FormState::Open);
    }

    #[tokio::test]
    async fn test_logout_expires_cookies_and_drops_session() {
        let fx = fixture();
        fx.state.sessions.get_or_create("sess-1").await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/logout?session_id=sess-1")
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let cookies: Vec<&str> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cookies.iter().any(|c| c.starts_with("AuthToken=")));

        assert!(!fx.state.sessions.exists("sess-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_skills_listed_with_schemas() {
        let fx = fixture();
        let response = fx.router().oneshot(get("/api/v1/skills")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let skills = body_json(response).await;
        assert_eq!(skills.as_array().unwrap().len(), 1);
        assert_eq!(skills[0]["name"], "log_form");
        assert_eq!(skills[0]["parameters"]["required"][0], "session_id");
    }

    #[tokio::test]
    async fn test_invoke_log_form_persists_and_broadcasts() {
        let fx = fixture();
        let (_conn, mut admin_rx) = fx.state.hub.join_admins();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/skills/log_form/invoke")
            .header("Content-Type", "application/json")
            .body(Body::from(
                r#"{"session_id":"sess-1","description":"payment page times out","urgency":"High"}"#,
            ))
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["result"].as_str().unwrap().contains("#1"));

        let form = fx.state.forms.get_by_id(1).await.unwrap();
        assert_eq!(form.urgency, FormUrgency::High);
        assert!(matches!(
            admin_rx.try_recv().unwrap(),
            HubEvent::AdminReceiveForm { form } if form.id == 1
        ));
    }

    #[tokio::test]
    async fn test_invoke_unknown_skill_is_404() {
        let fx = fixture();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/skills/teleport/invoke")
            .header("Content-Type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_callback_rejects_unknown_provider() {
        let fx = fixture();
        let response = fx
            .router()
            .oneshot(get("/api/v1/auth/myspace/callback?code=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_rotates_access_cookie() {
        let fx = fixture();
        let user = fx.state.users.create_local("ada", "hash").await.unwrap();
        let refresh = fx.tokens.issue(&user, TokenKind::Refresh).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/refresh")
            .header("Cookie", format!("RefreshToken={refresh}"))
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("AuthToken="));
        assert!(cookie.contains("HttpOnly"));
        assert_eq!(body_json(response).await["username"], "ada");
    }

    #[tokio::test]
    async fn test_refresh_rejects_missing_or_wrong_kind_cookie() {
        let fx = fixture();

        // No refresh cookie at all.
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/refresh")
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // An access token smuggled into the refresh cookie.
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/refresh")
            .header("Cookie", format!("RefreshToken={}", fx.admin_token()))
            .body(Body::empty())
            .unwrap();
        let response = fx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    /// Bind the fixture's router on an ephemeral port for websocket clients.
    async fn serve(fx: &Fixture) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = fx.router();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    /// Wait until the hub has registered `count` connections; joining happens
    /// after the upgrade handshake, so a fresh client may not be in yet.
    async fn wait_for_connections(fx: &Fixture, count: usize) {
        for _ in 0..100 {
            if fx.state.hub.connection_count() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("hub never reached {count} connection(s)");
    }

    #[tokio::test]
    async fn test_admin_hub_rejects_before_upgrade() {
        use tokio_tungstenite::tungstenite;
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let fx = fixture();
        let addr = serve(&fx).await;

        // No credentials at all.
        match tokio_tungstenite::connect_async(format!("ws://{addr}/hubs/admin")).await {
            Err(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            }
            Ok(_) => panic!("handshake should have been rejected"),
            Err(other) => panic!("unexpected handshake error: {other}"),
        }

        // A valid token without the admin role gets the same answer.
        let mut request = format!("ws://{addr}/hubs/admin")
            .into_client_request()
            .unwrap();
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {}", fx.user_token()).parse().unwrap(),
        );
        match tokio_tungstenite::connect_async(request).await {
            Err(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            }
            Ok(_) => panic!("handshake should have been rejected"),
            Err(other) => panic!("unexpected handshake error: {other}"),
        }

        assert_eq!(fx.state.hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_admin_hub_streams_events_with_token_in_query() {
        use futures::StreamExt;

        let fx = fixture();
        let addr = serve(&fx).await;
        let token = fx.admin_token();

        let (mut socket, response) =
            tokio_tungstenite::connect_async(format!("ws://{addr}/hubs/admin?access_token={token}"))
                .await
                .unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        wait_for_connections(&fx, 1).await;

        let form = fx.seed_form("checkout down", FormUrgency::Critical, "s1").await;
        let views = fx.state.forms.to_views(&[form.clone()]).await.unwrap();
        fx.state.hub.broadcast_state_change(&views[0]);

        let message = socket.next().await.unwrap().unwrap();
        let event: HubEvent = serde_json::from_str(message.to_text().unwrap()).unwrap();
        assert!(matches!(event, HubEvent::FormStateChanged { form: view } if view.id == form.id));
    }

    #[tokio::test]
    async fn test_forms_hub_streams_session_events_without_auth() {
        use futures::StreamExt;

        let fx = fixture();
        let addr = serve(&fx).await;

        let (mut socket, response) =
            tokio_tungstenite::connect_async(format!("ws://{addr}/hubs/forms?session_id=sess-1"))
                .await
                .unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        wait_for_connections(&fx, 1).await;

        let form = fx.seed_form("vpn flapping", FormUrgency::High, "sess-1").await;
        let views = fx.state.forms.to_views(&[form.clone()]).await.unwrap();
        fx.state.hub.broadcast_new_form(Some("sess-1"), &views[0]);

        let message = socket.next().await.unwrap().unwrap();
        let event: HubEvent = serde_json::from_str(message.to_text().unwrap()).unwrap();
        assert!(matches!(event, HubEvent::ReceiveUserForm { form: view } if view.id == form.id));
    }
}

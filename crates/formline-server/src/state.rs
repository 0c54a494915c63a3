//! Application state shared across handlers.

use std::sync::Arc;

use formline_auth::IdentityResolver;
use formline_hub::FanoutHub;
use formline_session::{FormIndex, SessionStore};
use formline_skill::SkillRegistry;
use formline_store::{FormsRepository, UserStore};

use crate::config::ServerConfig;
use crate::failover::{Backends, StorageStatus};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Sliding-TTL session store.
    pub sessions: SessionStore,

    /// Per-session form id index.
    pub index: FormIndex,

    /// Form storage. Which backend this is was decided once at startup.
    pub forms: Arc<dyn FormsRepository>,

    /// User storage, same backend object as `forms`.
    pub users: Arc<dyn UserStore>,

    /// Token verification and OAuth sign-in.
    pub resolver: Arc<IdentityResolver>,

    /// Broadcast hub for live form events.
    pub hub: Arc<FanoutHub>,

    /// Skills an external conversational runtime may invoke.
    pub skills: Arc<SkillRegistry>,

    /// Which storage backend was selected and whether it was a fallback.
    pub storage: StorageStatus,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        sessions: SessionStore,
        index: FormIndex,
        backends: Backends,
        resolver: Arc<IdentityResolver>,
        hub: Arc<FanoutHub>,
        skills: SkillRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            index,
            forms: backends.forms,
            users: backends.users,
            resolver,
            hub,
            skills: Arc::new(skills),
            storage: backends.status,
        }
    }
}

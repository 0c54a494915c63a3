//! Session records and the store that owns them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use formline_types::ChatMessage;

use crate::backend::CacheBackend;
use crate::error::Result;

/// A conversational session.
///
/// Lives under the cache key `session:<id>` and is always rewritten whole;
/// there is no partial-field update, so two concurrent updates for the same
/// id are a last-writer-wins race. That is accepted: chat turns for one
/// session arrive sequentially from a single client, and a lost turn under
/// multi-tab usage does not affect form delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }
}

/// Store for session records, keyed by session id.
///
/// All mutation flows through get-or-create followed by update; no other
/// component touches session records directly.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn CacheBackend>,
}

impl SessionStore {
    /// Create a store over the given cache backend.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    fn key(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    /// Fetch the session for `session_id`, creating a fresh one if the cache
    /// has no (live) entry.
    ///
    /// Absence is not an error. Every call rewrites the entry, so the TTL
    /// slides forward; on a hit `last_activity` is refreshed, while a fresh
    /// session keeps `created_at == last_activity` from its single birth
    /// instant.
    pub async fn get_or_create(&self, session_id: &str) -> Result<Session> {
        let session = match self.backend.get(&Self::key(session_id)).await? {
            Some(json) => {
                let mut session: Session = serde_json::from_str(&json)?;
                session.last_activity = Utc::now();
                session
            }
            None => {
                debug!(session_id = %session_id, "creating new session");
                Session::new(session_id)
            }
        };

        self.write(&session).await?;
        Ok(session)
    }

    /// Overwrite the stored session, refreshing `last_activity` and resetting
    /// the sliding TTL.
    pub async fn update(&self, mut session: Session) -> Result<()> {
        session.last_activity = Utc::now();
        self.write(&session).await
    }

    /// Append chat messages to a session's history.
    pub async fn append_messages(&self, session_id: &str, messages: &[ChatMessage]) -> Result<()> {
        let mut session = self.get_or_create(session_id).await?;
        session.messages.extend_from_slice(messages);
        self.update(session).await
    }

    /// Check whether a live session exists, WITHOUT extending its life.
    ///
    /// Used for client-side session validation; the asymmetry with
    /// [`get_or_create`](Self::get_or_create) is deliberate.
    pub async fn exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.backend.peek(&Self::key(session_id)).await?.is_some())
    }

    /// Delete the session entry outright (logout flows).
    pub async fn remove(&self, session_id: &str) -> Result<()> {
        self.backend.remove(&Self::key(session_id)).await
    }

    async fn write(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.backend.set(&Self::key(&session.id), json).await
    }
}

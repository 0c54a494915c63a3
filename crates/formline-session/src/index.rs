//! Per-session index of submitted form ids.

use std::sync::Arc;

use tracing::debug;

use crate::backend::CacheBackend;
use crate::error::Result;

/// Append-only list of form ids per session, under `sessionForms:<id>`.
///
/// Stored as its own cache entry with the same TTL policy as the session
/// record but an independent expiry clock: a session can forget its chat
/// history while its form index survives, or vice versa. That inconsistency
/// window is accepted: the index holds only back-references, never form
/// data, so nothing diverges.
#[derive(Clone)]
pub struct FormIndex {
    backend: Arc<dyn CacheBackend>,
}

impl FormIndex {
    /// Create an index over the given cache backend.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    fn key(session_id: &str) -> String {
        format!("sessionForms:{session_id}")
    }

    /// Read the form ids recorded for a session, oldest first.
    ///
    /// A plain read; does not extend the entry's life.
    pub async fn form_ids(&self, session_id: &str) -> Result<Vec<i64>> {
        match self.backend.peek(&Self::key(session_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append a form id to a session's index, extending the entry's TTL.
    pub async fn append(&self, session_id: &str, form_id: i64) -> Result<()> {
        let key = Self::key(session_id);
        let mut ids: Vec<i64> = match self.backend.get(&key).await? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        ids.push(form_id);

        debug!(session_id = %session_id, form_id, count = ids.len(), "appended form to session index");
        self.backend.set(&key, serde_json::to_string(&ids)?).await
    }
}

//! Process-local fallback backend for forms and users.
//!
//! Serves the same contracts as the SQLite store when the durable database
//! cannot be opened at startup. Nothing survives a restart; the server
//! reports itself degraded while this backend is live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use formline_session::FormIndex;
use formline_types::{Form, FormState, FormView, User};

use crate::repo::{
    ExternalProvider, FormQuery, FormsRepository, UserStore, project_views, suffixed_username,
};
use crate::{Result, StoreError};

/// In-memory store for forms and users.
pub struct MemoryStore {
    forms: Mutex<HashMap<i64, Form>>,
    users: Mutex<HashMap<i64, User>>,
    next_form_id: AtomicI64,
    next_user_id: AtomicI64,
    index: FormIndex,
}

impl MemoryStore {
    pub fn new(index: FormIndex) -> Self {
        warn!("using in-memory form storage; data will not survive a restart");
        Self {
            forms: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            next_form_id: AtomicI64::new(1),
            next_user_id: AtomicI64::new(1),
            index,
        }
    }
}

#[async_trait]
impl FormsRepository for MemoryStore {
    async fn save(&self, mut form: Form, session_id: Option<&str>) -> Result<Form> {
        form.id = self.next_form_id.fetch_add(1, Ordering::SeqCst);
        self.forms.lock().insert(form.id, form.clone());

        if let Some(session_id) = session_id {
            self.index.append(session_id, form.id).await?;
        }
        Ok(form)
    }

    async fn get_by_id(&self, id: i64) -> Result<Form> {
        self.forms
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StoreError::FormNotFound(id))
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Form>> {
        let forms = self.forms.lock();
        Ok(ids.iter().filter_map(|id| forms.get(id).cloned()).collect())
    }

    async fn query(&self, query: &FormQuery) -> Result<Vec<FormView>> {
        let keyword = query.keyword.as_ref().map(|k| k.to_lowercase());
        let matched = {
            let forms = self.forms.lock();
            let mut matched: Vec<Form> = forms
                .values()
                .filter(|f| query.state.is_none_or(|s| f.state == s))
                .filter(|f| query.category.is_none_or(|c| f.category == c))
                .filter(|f| query.urgency.is_none_or(|u| f.urgency == u))
                .filter(|f| {
                    keyword
                        .as_ref()
                        .is_none_or(|k| f.description.to_lowercase().contains(k))
                })
                .cloned()
                .collect();
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

            matched
                .into_iter()
                .skip(query.offset())
                .take(query.page_size)
                .collect::<Vec<Form>>()
        };

        self.to_views(&matched).await
    }

    async fn to_views(&self, forms: &[Form]) -> Result<Vec<FormView>> {
        project_views(forms, self).await
    }

    async fn update_state(&self, id: i64, state: FormState) -> Result<Form> {
        let mut forms = self.forms.lock();
        let form = forms.get_mut(&id).ok_or(StoreError::FormNotFound(id))?;
        form.state = state;
        Ok(form.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: i64) -> Result<User> {
        self.users
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StoreError::UserNotFound(id))
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let users = self.users.lock();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self.users.lock().values().any(|u| u.username == username))
    }

    async fn create_local(&self, username: &str, password_hash: &str) -> Result<User> {
        let mut users = self.users.lock();
        if users.values().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }

        let mut user = User::new(username, Some(password_hash.to_string()));
        user.id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_or_create_external(
        &self,
        provider: ExternalProvider,
        external_id: &str,
        username: &str,
        email: Option<&str>,
    ) -> Result<User> {
        let mut users = self.users.lock();

        let existing = users.values().find(|u| match provider {
            ExternalProvider::GitHub => u.github_id.as_deref() == Some(external_id),
            ExternalProvider::Google => u.google_id.as_deref() == Some(external_id),
        });
        if let Some(user) = existing {
            return Ok(user.clone());
        }

        let taken = users.values().any(|u| u.username == username);
        let name = if taken {
            suffixed_username(username, external_id)
        } else {
            username.to_string()
        };

        let mut user = User::new(name, None);
        user.id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        user.email = email.map(String::from);
        match provider {
            ExternalProvider::GitHub => user.github_id = Some(external_id.to_string()),
            ExternalProvider::Google => user.google_id = Some(external_id.to_string()),
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

//! Storage abstraction traits for forms and users.
//!
//! Two backends implement these traits interchangeably:
//!
//! ```text
//! FormsRepository / UserStore (traits)
//!     └── SqliteStore   - durable SQLite backend
//!     └── MemoryStore   - process-local fallback
//! ```
//!
//! The serving path holds `Arc<dyn FormsRepository>` and `Arc<dyn UserStore>`
//! and never learns which backend it got.

use std::collections::HashMap;

use async_trait::async_trait;

use formline_types::{Form, FormCategory, FormState, FormUrgency, FormView, User};

use crate::Result;

/// Default page size for admin form listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// External identity provider for OAuth sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalProvider {
    GitHub,
    Google,
}

impl ExternalProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Google => "google",
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::GitHub => "github_id",
            Self::Google => "google_id",
        }
    }
}

impl std::fmt::Display for ExternalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExternalProvider {
    type Err = formline_types::ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("github") {
            Ok(Self::GitHub)
        } else if s.eq_ignore_ascii_case("google") {
            Ok(Self::Google)
        } else {
            Err(formline_types::ValidationError::new("provider", s))
        }
    }
}

/// Filter and paging for admin form listings. Pages are 1-based.
#[derive(Debug, Clone)]
pub struct FormQuery {
    pub state: Option<FormState>,
    pub category: Option<FormCategory>,
    pub urgency: Option<FormUrgency>,
    /// Case-insensitive substring match on the description.
    pub keyword: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for FormQuery {
    fn default() -> Self {
        Self {
            state: None,
            category: None,
            urgency: None,
            keyword: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FormQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: FormState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_category(mut self, category: FormCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_urgency(mut self, urgency: FormUrgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Row offset of the first result (page 0 is treated as page 1).
    ///
    /// Saturates instead of overflowing; page and size arrive straight from
    /// query parameters.
    pub fn offset(&self) -> usize {
        self.page
            .max(1)
            .saturating_sub(1)
            .saturating_mul(self.page_size)
    }
}

/// Repository for submitted support forms.
#[async_trait]
pub trait FormsRepository: Send + Sync {
    /// Persist a new form, assigning its id.
    ///
    /// Id assignment is atomic: two concurrent saves never share an id.
    /// When `session_id` is given, the saved form's id is also appended to
    /// that session's form index.
    async fn save(&self, form: Form, session_id: Option<&str>) -> Result<Form>;

    /// Fetch one form by id.
    async fn get_by_id(&self, id: i64) -> Result<Form>;

    /// Fetch several forms by id, skipping ids with no record.
    ///
    /// Returned in the order of `ids`.
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Form>>;

    /// List form views matching a filter, newest first.
    async fn query(&self, query: &FormQuery) -> Result<Vec<FormView>>;

    /// Project forms into client views, resolving usernames.
    async fn to_views(&self, forms: &[Form]) -> Result<Vec<FormView>>;

    /// Change a form's lifecycle state, returning the updated record.
    async fn update_state(&self, id: i64, state: FormState) -> Result<Form>;
}

/// Store for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch one user by id.
    async fn get_by_id(&self, id: i64) -> Result<User>;

    /// Fetch several users by id, skipping ids with no record.
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;

    /// Look up a user by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Check whether a username is taken.
    async fn username_exists(&self, username: &str) -> Result<bool>;

    /// Create a local account with a password hash.
    async fn create_local(&self, username: &str, password_hash: &str) -> Result<User>;

    /// Fetch the user bound to an external identity, creating the account on
    /// first sign-in.
    ///
    /// If the preferred username is already taken by another account, a
    /// suffix derived from the external id is appended.
    async fn get_or_create_external(
        &self,
        provider: ExternalProvider,
        external_id: &str,
        username: &str,
        email: Option<&str>,
    ) -> Result<User>;
}

/// Resolve usernames for a batch of forms and project them into client views.
///
/// Shared by both backends; the projection itself is [`FormView::project`].
pub async fn project_views(forms: &[Form], users: &dyn UserStore) -> Result<Vec<FormView>> {
    let mut ids: Vec<i64> = forms.iter().filter_map(|f| f.user_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let names: HashMap<i64, String> = users
        .get_by_ids(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    Ok(forms
        .iter()
        .map(|f| FormView::project(f, f.user_id.and_then(|id| names.get(&id).cloned())))
        .collect())
}

/// Username to fall back to when the preferred one is taken: the preferred
/// name plus a short prefix of the external id.
pub(crate) fn suffixed_username(preferred: &str, external_id: &str) -> String {
    let suffix: String = external_id.chars().take(6).collect();
    format!("{preferred}-{suffix}")
}

//! Durable storage for support forms and user accounts.
//!
//! Exposes [`FormsRepository`] and [`UserStore`] traits with two
//! interchangeable backends: [`SqliteStore`] for normal operation and
//! [`MemoryStore`] as the degraded-mode fallback. Saving a form with a
//! session id also records the form in that session's cache-side index.

mod error;
mod memory;
mod repo;
mod sqlite;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use repo::{
    DEFAULT_PAGE_SIZE, ExternalProvider, FormQuery, FormsRepository, UserStore, project_views,
};
pub use sqlite::SqliteStore;

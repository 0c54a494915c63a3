//! Session state with sliding expiration.
//!
//! This crate owns all conversational session state: chat history per session
//! and the per-session index of submitted form ids. Both live in a string
//! key/value cache with TTL support ([`CacheBackend`]); the bundled
//! [`MemoryCacheBackend`] bounds memory with LRU eviction and tracks per-key
//! expiry, and a distributed cache can be swapped in behind the same trait.
//!
//! Reads through [`SessionStore::get_or_create`] are never side-effect-free:
//! every call refreshes the session's last-activity timestamp and rewrites the
//! cache entry, sliding its expiry forward. [`SessionStore::exists`] is the
//! one deliberate exception, a validity probe that must not extend a
//! session's life.

mod backend;
mod config;
mod error;
mod index;
mod store;
mod ttl;

pub use backend::{CacheBackend, MemoryCacheBackend};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use index::FormIndex;
pub use store::{Session, SessionStore};
pub use ttl::TtlTracker;

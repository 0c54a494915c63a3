//! Cache backend abstraction and the in-memory implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::ttl::TtlTracker;

/// A string key/value store with sliding TTL.
///
/// This is the contract the session store consumes; it matches what a
/// distributed cache offers (atomic per-key get/set/remove with expiry).
/// The read path comes in two flavors: [`get`](CacheBackend::get) slides the
/// entry's expiry forward, [`peek`](CacheBackend::peek) does not.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read a value, refreshing its TTL (sliding expiration).
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read a value without touching its TTL.
    async fn peek(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, resetting its TTL to the full window.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Delete a value outright.
    async fn remove(&self, key: &str) -> Result<()>;
}

struct CacheInner {
    lru: LruCache<String, String>,
    ttl: TtlTracker,
}

/// In-memory cache backend with LRU capacity bounding and per-key TTL.
///
/// Used as the process-local stand-in for a distributed cache. Expired
/// entries are dropped lazily on access; [`cleanup_expired`] can be called
/// from a periodic task to reclaim memory eagerly.
///
/// [`cleanup_expired`]: MemoryCacheBackend::cleanup_expired
pub struct MemoryCacheBackend {
    inner: Arc<RwLock<CacheInner>>,
    config: CacheConfig,
}

impl MemoryCacheBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let cap =
            NonZeroUsize::new(config.max_entries).unwrap_or_else(|| NonZeroUsize::new(1).unwrap());

        let inner = CacheInner {
            lru: LruCache::new(cap),
            ttl: TtlTracker::new(config.ttl),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current number of cached entries (including not-yet-reclaimed expired
    /// ones).
    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    /// Check if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }

    /// Drop all expired entries, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired = inner.ttl.drain_expired();
        let count = expired.len();
        for key in expired {
            inner.lru.pop(&key);
        }
        if count > 0 {
            debug!(count, "cleaned up expired cache entries");
        }
        count
    }
}

impl Clone for MemoryCacheBackend {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.write().await;

        if inner.ttl.is_expired(key) {
            if inner.lru.pop(key).is_some() {
                debug!(key = %key, "cache entry expired, removing");
            }
            inner.ttl.remove(key);
            return Ok(None);
        }

        match inner.lru.get(key) {
            Some(value) => {
                let value = value.clone();
                inner.ttl.touch(key);
                trace!(key = %key, "cache hit");
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn peek(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        if inner.ttl.is_expired(key) {
            Ok(None)
        } else {
            Ok(inner.lru.peek(key).cloned())
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut inner = self.inner.write().await;

        // At capacity the LruCache evicts on put; drop the victim's TTL
        // record too so it doesn't linger.
        if inner.lru.len() >= self.config.max_entries && !inner.lru.contains(key) {
            if let Some((evicted, _)) = inner.lru.peek_lru() {
                let evicted = evicted.clone();
                debug!(key = %evicted, "evicting LRU cache entry");
                inner.ttl.remove(&evicted);
            }
        }

        inner.lru.put(key.to_string(), value);
        inner.ttl.touch(key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.ttl.remove(key);
        inner.lru.pop(key);
        Ok(())
    }
}

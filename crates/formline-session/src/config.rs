//! Configuration for the session cache.

use std::time::Duration;

/// Default session timeout (120 minutes, sliding).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(120 * 60);

/// Default maximum number of cache entries before LRU eviction.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Configuration for the session cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Sliding time-to-live for cache entries. Every TTL-refreshing access
    /// slides the expiry forward by this full window.
    pub ttl: Duration,

    /// Maximum number of entries to hold before evicting the least recently
    /// used one.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SESSION_TIMEOUT,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sliding TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

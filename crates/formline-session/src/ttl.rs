//! Per-key expiry tracking for the in-memory cache backend.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks last-access times for sliding-TTL expiration.
#[derive(Debug)]
pub struct TtlTracker {
    access_times: HashMap<String, Instant>,
    ttl: Duration,
}

impl TtlTracker {
    /// Create a new tracker with the given sliding window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            access_times: HashMap::new(),
            ttl,
        }
    }

    /// Record an access for a key, sliding its expiry forward.
    pub fn touch(&mut self, key: &str) {
        self.access_times.insert(key.to_string(), Instant::now());
    }

    /// Check whether a key has expired. Keys with no access record count as
    /// expired.
    pub fn is_expired(&self, key: &str) -> bool {
        match self.access_times.get(key) {
            None => true,
            Some(last_access) => last_access.elapsed() > self.ttl,
        }
    }

    /// Stop tracking a key.
    pub fn remove(&mut self, key: &str) {
        self.access_times.remove(key);
    }

    /// Remove all expired entries and return their keys.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let ttl = self.ttl;
        let now = Instant::now();
        let expired: Vec<String> = self
            .access_times
            .iter()
            .filter(|(_, last)| now.duration_since(**last) > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.access_times.remove(key);
        }
        expired
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.access_times.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.access_times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_touch_resets_timer() {
        let mut tracker = TtlTracker::new(Duration::from_millis(50));
        tracker.touch("s-1");

        thread::sleep(Duration::from_millis(30));
        tracker.touch("s-1");
        thread::sleep(Duration::from_millis(30));

        // Total elapsed > 50ms, but the second touch slid the window.
        assert!(!tracker.is_expired("s-1"));
    }

    #[test]
    fn test_expiration() {
        let mut tracker = TtlTracker::new(Duration::from_millis(10));
        tracker.touch("s-1");

        thread::sleep(Duration::from_millis(20));

        assert!(tracker.is_expired("s-1"));
        assert_eq!(tracker.drain_expired(), vec!["s-1".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_untracked_key_is_expired() {
        let tracker = TtlTracker::new(Duration::from_secs(60));
        assert!(tracker.is_expired("never-seen"));
    }
}

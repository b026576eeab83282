use std::collections::HashMap;

use tokio::time::{Duration, Instant};

/// A memoized value and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub result: V,
    pub expires_at: Instant,
}

/// Time-to-live memoization keyed by context key.
///
/// Pure time-based expiry: an expired slot is reported as a miss and dropped
/// on the next `store`. No LRU, no background sweeping.
#[derive(Debug, Clone)]
pub struct ResultCache<V> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key` while `now < expires_at`.
    pub fn lookup(&self, key: &str) -> Option<&V> {
        self.lookup_at(key, Instant::now())
    }

    pub fn lookup_at(&self, key: &str, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| &entry.result)
    }

    pub fn store(&mut self, key: impl Into<String>, result: V) {
        self.store_at(key, result, Instant::now());
    }

    pub fn store_at(&mut self, key: impl Into<String>, result: V, now: Instant) {
        // context keys carry a title hash, so stale keys rarely come back
        self.entries.retain(|_, entry| now < entry.expires_at);

        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            result,
            expires_at: now + self.ttl,
        };
        self.entries.insert(key, entry);
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of slots, live or expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_hit_immediately_after_store() {
        let mut cache = ResultCache::new(Duration::from_secs(5));
        cache.store("com.apple.Safari#1", "browsing");
        assert_eq!(cache.lookup("com.apple.Safari#1"), Some(&"browsing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_after_ttl() {
        let mut cache = ResultCache::new(Duration::from_secs(5));
        cache.store("key", 1u32);

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert_eq!(cache.lookup("key"), Some(&1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.lookup("key"), None);
        // the expired slot stays until the next store
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sweeps_expired_keys() {
        let mut cache = ResultCache::new(Duration::from_millis(10));
        for i in 0..1_000 {
            cache.store(format!("com.apple.Safari#{i}"), i);
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        assert_eq!(cache.len(), 1);

        cache.store("fresh", 0);
        cache.store("fresher", 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("fresh"), Some(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_overwrites_expired_slot() {
        let mut cache = ResultCache::new(Duration::from_secs(1));
        cache.store("key", "old");
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.lookup("key").is_none());

        cache.store("key", "new");
        assert_eq!(cache.lookup("key"), Some(&"new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unknown_key_misses() {
        let cache: ResultCache<u8> = ResultCache::new(Duration::from_secs(1));
        assert!(cache.lookup_at("missing", Instant::now()).is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = ResultCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.store_at("a", 1, now);
        cache.store_at("b", 2, now);
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.lookup_at("b", now), Some(&2));
        cache.clear();
        assert!(cache.is_empty());
    }
}

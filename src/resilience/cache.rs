//! Bounded TTL cache backing the cached-response fallback.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Bounded cache of recent successful responses, keyed by caller-chosen
/// strings.
///
/// Entries expire lazily: a read past `stored_at + ttl` is treated as a miss
/// and removed. When the cache is full, the oldest insertion is evicted.
/// Values are stored as JSON so one cache serves heterogeneous response
/// types; a hit that no longer decodes to the caller's type counts as a miss.
#[derive(Debug)]
pub struct FallbackCache {
    capacity: usize,
    default_ttl: Duration,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CachedEntry>,
    insertion_order: VecDeque<String>,
}

impl FallbackCache {
    /// Create a cache holding up to `capacity` entries, each living for
    /// `default_ttl` unless stored with an explicit TTL.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            capacity,
            default_ttl,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Store `value` under `key` with the default TTL.
    pub fn put(&self, key: &str, value: Value) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key` with an explicit TTL.
    pub fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(key) {
            while inner.entries.len() >= self.capacity {
                match inner.insertion_order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.insertion_order.push_back(key.to_string());
        }
        inner.entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Fetch the live value under `key`, removing it if expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                inner.entries.remove(key);
                inner.insertion_order.retain(|k| k != key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Remove `key` outright.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock();
        inner.entries.remove(key);
        inner.insertion_order.retain(|k| k != key);
    }

    /// Number of entries currently stored, counting expired-but-unread ones.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

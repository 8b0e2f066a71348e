//! Generic expiring map
//!
//! Entries expire lazily: an expired entry is dropped on the read that
//! finds it, never by a background task. Disabling the cache empties it,
//! so re-enabling starts cold.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default entry lifetime, four hours
pub const DEFAULT_TTL_SECS: u64 = 14_400;

/// Build a cache key from identifying fields. Every field is prefixed so
/// `["a", "bc"]` and `["ab", "c"]` never collide.
pub fn cache_key<S: AsRef<str>>(fields: &[S]) -> String {
    let mut key = String::new();
    for field in fields {
        key.push(':');
        key.push_str(field.as_ref());
    }
    key
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    enabled: bool,
}

/// Expiring key/value store, safe to share across threads
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                enabled: true,
            }),
            ttl,
        }
    }

    pub fn enable(&self) {
        self.inner.lock().enabled = true;
    }

    /// Disabling also empties the cache
    pub fn disable(&self) {
        let mut inner = self.inner.lock();
        inner.enabled = false;
        inner.entries.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    pub fn insert(&self, key: &str, value: V) {
        self.insert_with_ttl(key, value, self.ttl);
    }

    pub fn insert_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return;
        }
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Fetch a live entry; an expired one is evicted and reported absent
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return None;
        }
        match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.lock().entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

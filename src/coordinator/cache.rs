//! Time-bounded response cache.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::traits::Response;

/// A cached successful response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Response,
    pub created_at: Instant,
}

impl CacheEntry {
    pub fn new(payload: Response) -> Self {
        Self {
            payload,
            created_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, timeout: Duration) -> bool {
        self.created_at.elapsed() < timeout
    }
}

/// Response cache keyed by request key. Expired entries are evicted when read.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
}

impl ResponseCache {
    /// The cached payload for `key` if it is younger than `timeout`.
    pub fn get(&mut self, key: &str, timeout: Duration) -> Option<Response> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(timeout) => Some(entry.payload.clone()),
            Some(_) => {
                self.entries.remove(key);
                tracing::trace!(key, "Cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Store `payload`, restarting the entry's age.
    pub fn insert(&mut self, key: &str, payload: Response) {
        self.entries.insert(key.to_string(), CacheEntry::new(payload));
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. Returns how many.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

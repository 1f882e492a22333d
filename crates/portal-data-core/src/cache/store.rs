use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::CacheKey;
use crate::clock::Clock;

/// A cached response payload and the time it was stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub stored_at_ms: i64,
    pub payload: Value,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.stored_at_ms
    }

    /// Fresh while the entry's age does not exceed `ttl_ms`.
    pub fn is_fresh(&self, ttl_ms: u64, now_ms: i64) -> bool {
        i128::from(self.age_ms(now_ms)) <= i128::from(ttl_ms)
    }
}

/// Key to payload map stamped by the supplied clock.
///
/// Pure storage: freshness is decided by the caller's TTL, and the only
/// invalidation is [`CacheStore::clear`]. The lock is held for single map
/// operations only, never across an await point.
pub struct CacheStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw lookup, ignoring age.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries().get(key).cloned()
    }

    /// Payload for `key` if it was stored no more than `ttl_ms` ago.
    pub fn get_fresh(&self, key: &CacheKey, ttl_ms: u64) -> Option<Value> {
        let now = self.clock.now_ms();
        self.entries()
            .get(key)
            .filter(|entry| entry.is_fresh(ttl_ms, now))
            .map(|entry| entry.payload.clone())
    }

    /// Store `payload` under `key`, replacing any previous entry.
    pub fn set(&self, key: CacheKey, payload: Value) {
        let entry = CacheEntry {
            stored_at_ms: self.clock.now_ms(),
            payload,
        };
        self.entries().insert(key, entry);
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        if !entries.is_empty() {
            debug!(dropped = entries.len(), "Clearing response cache");
        }
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Keys and entries sorted by key, for diagnostics.
    pub fn snapshot(&self) -> Vec<(String, CacheEntry)> {
        let mut items: Vec<(String, CacheEntry)> = self
            .entries()
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
    }
}

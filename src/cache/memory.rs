//! Memory Store Module
//!
//! In-process cache store with LRU eviction and TTL expiration.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::cache::{CacheEntry, CacheStore};
use crate::error::StoreError;

// == Memory Store ==
/// Bounded in-memory store.
///
/// Reads promote entries in the LRU order, so the lock is always exclusive.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` entries (at least one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;

        let expired_keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            entries.pop(key);
        }

        expired_keys.len()
    }

    /// Remaining lifetime of a live entry, without touching its LRU position.
    pub async fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().await;
        entries
            .peek(key)
            .filter(|entry| !entry.is_expired())
            .map(CacheEntry::ttl_remaining)
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn write_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.put(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

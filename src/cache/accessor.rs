//! Cache-Aside Accessor
//!
//! The get-or-compute-and-cache primitive. Reads the store, falls back to a
//! caller-supplied producer on a miss, and repopulates the store on a detached
//! task so that a failed write never fails the call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheStats, CacheStore};
use crate::config::{Config, CorruptEntryPolicy, DEFAULT_EXPIRATION};
use crate::error::{CacheError, CacheWriteError, Result, StoreError};

// == Cache Options ==
/// Tunables of the accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// TTL applied to every write
    pub ttl: Duration,
    /// Upper bound for each store read and write
    pub store_timeout: Duration,
    /// Handling of cached bytes that fail to decode
    pub corrupt_entry_policy: CorruptEntryPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_EXPIRATION),
            store_timeout: Duration::from_secs(2),
            corrupt_entry_policy: CorruptEntryPolicy::Fail,
        }
    }
}

impl CacheOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: config.ttl(),
            store_timeout: config.store_timeout(),
            corrupt_entry_policy: config.corrupt_entry_policy,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_corrupt_entry_policy(mut self, policy: CorruptEntryPolicy) -> Self {
        self.corrupt_entry_policy = policy;
        self
    }
}

// == Cache Aside ==
/// Cache-aside accessor over a shared store handle.
///
/// Cloning is cheap; clones share the store, the counters and the set of
/// pending writes.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    options: CacheOptions,
    stats: Arc<StatsRecorder>,
    writes: TaskTracker,
}

impl CacheAside {
    // == Constructor ==
    pub fn new(store: Arc<dyn CacheStore>, options: CacheOptions) -> Self {
        Self {
            store,
            options,
            stats: Arc::new(StatsRecorder::default()),
            writes: TaskTracker::new(),
        }
    }

    // == Get Or Set ==
    /// Returns the cached value for `key`, or fetches, caches and returns a
    /// fresh one.
    ///
    /// - A hit decodes the stored bytes; `fetch_fresh` is not called.
    /// - A miss calls `fetch_fresh` once. On success the value is written back
    ///   with the configured TTL on a detached task and returned immediately.
    /// - A store read failure (including a timeout) is returned as
    ///   [`CacheError::Infrastructure`] without calling `fetch_fresh`.
    /// - A producer failure is returned as [`CacheError::Producer`] and nothing
    ///   is written.
    ///
    /// Nothing is retried at this layer.
    pub async fn get_or_set_cache<T, F, Fut, E>(&self, key: &str, fetch_fresh: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }

        match self.read(key).await? {
            Some(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    self.stats.record_hit();
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    self.stats.record_decode_failure();
                    match self.options.corrupt_entry_policy {
                        CorruptEntryPolicy::Fail => {
                            warn!(key, error = %err, "cached value could not be decoded");
                            return Err(CacheError::Deserialization {
                                key: key.to_string(),
                                message: err.to_string(),
                            });
                        }
                        CorruptEntryPolicy::Refetch => {
                            warn!(key, error = %err, "cached value could not be decoded, refetching");
                            self.stats.record_miss();
                        }
                    }
                }
            },
            None => {
                self.stats.record_miss();
                debug!(key, "cache miss");
            }
        }

        self.stats.record_fetch();
        let value = fetch_fresh().await.map_err(|err| {
            self.stats.record_fetch_failure();
            let err = CacheError::producer(err);
            debug!(key, error = %err, "producer failed, nothing cached");
            err
        })?;

        self.spawn_write(key, &value);
        Ok(value)
    }

    // == Stats ==
    /// Returns a snapshot of the accessor counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Number of detached writes still running.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    // == Drain Writes ==
    /// Waits for every detached write spawned so far to finish.
    ///
    /// Writes are never cancelled; this only observes their completion.
    pub async fn drain_writes(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let timeout = self.options.store_timeout;
        let outcome = match tokio::time::timeout(timeout, self.store.read(key)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StoreError::Timeout(timeout)),
        };

        outcome.map_err(|err| {
            self.stats.record_read_failure();
            warn!(key, store = self.store.name(), error = %err, "cache read failed");
            CacheError::from(err)
        })
    }

    /// Encodes `value` and hands the write to a detached task.
    ///
    /// Failures go to the log and the `write_failures` counter only.
    fn spawn_write<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(source) => {
                self.stats.record_write_failure();
                let err = CacheWriteError::Encode {
                    key: key.to_string(),
                    source,
                };
                warn!(error = %err, "skipping cache write");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let key = key.to_string();
        let CacheOptions {
            ttl, store_timeout, ..
        } = self.options;

        self.writes.spawn(async move {
            let outcome =
                match tokio::time::timeout(store_timeout, store.write_with_ttl(&key, payload, ttl))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(StoreError::Timeout(store_timeout)),
                };

            match outcome {
                Ok(()) => {
                    stats.record_write();
                    debug!(key = %key, ttl_secs = ttl.as_secs(), "cache populated");
                }
                Err(source) => {
                    stats.record_write_failure();
                    let err = CacheWriteError::Store { key, source };
                    warn!(error = %err, "cache write failed");
                }
            }
        });
    }
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("store", &self.store.name())
            .field("options", &self.options)
            .finish()
    }
}

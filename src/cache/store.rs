//! Cache Store Trait
//!
//! The seam between the accessor and the expiring key-value store it sits on.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// A networked (or in-process) key-value store with per-entry TTL.
///
/// Implementations must be safe for concurrent use through a shared reference
/// and must keep three outcomes apart on read:
/// - `Ok(None)`: the key is absent or expired
/// - `Ok(Some(bytes))`: the key is present, possibly with an empty value
/// - `Err(_)`: the store itself failed
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads the raw bytes stored under `key`.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` under `key`, replacing any previous entry, expiring after `ttl`.
    async fn write_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

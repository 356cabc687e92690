//! Cache layer
//!
//! This module memoizes serializable results in a shared key-value store:
//! - [`CacheStore`] is the store seam (in-process map, SQLite file, or nothing)
//! - [`CacheAside`] is the generic get-or-compute decorator
//! - [`CachedFetcher`] applies it to a page fetcher, one entry per URL
//!
//! The cache is best-effort. Store errors and corrupt entries behave like a
//! miss and are never surfaced to callers.

mod fetcher;
mod memory;
mod sqlite;

pub use fetcher::{CachedFetcher, FETCH_NAMESPACE};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::CacheResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A key-value store with per-entry expiry
///
/// Implementations must be safe to share between concurrent tasks; each
/// `get`/`set` is atomic for its key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored bytes, or `None` when absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` for `ttl`, replacing any previous entry
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;
}

/// A store that never holds anything (caching disabled)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl CacheStore for NullStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }
}

/// Builds a deterministic cache key: `namespace:` followed by the JSON of `args`
///
/// Struct fields serialize in declaration order, so equal arguments always
/// produce equal keys.
pub fn cache_key<K: Serialize + ?Sized>(namespace: &str, args: &K) -> CacheResult<String> {
    Ok(format!("{}:{}", namespace, serde_json::to_string(args)?))
}

/// Cache-aside wrapper around any async computation
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    namespace: String,
    ttl: Duration,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Same store and TTL under a different key namespace
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: namespace.into(),
            ttl: self.ttl,
        }
    }

    /// Returns the cached value for `args`, computing and storing it on a miss
    ///
    /// # Arguments
    ///
    /// * `args` - Everything that affects the result; serialized into the key
    /// * `compute` - Produces the value on a miss
    ///
    /// # Returns
    ///
    /// The cached value on a hit, otherwise the freshly computed one. A store
    /// failure on either side falls back to `compute`.
    pub async fn get_or_compute<K, T, F, Fut>(&self, args: &K, compute: F) -> T
    where
        K: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = match cache_key(&self.namespace, args) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("Cannot build cache key in {}: {}", self.namespace, e);
                return compute().await;
            }
        };

        match self.store.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    tracing::debug!("Cache hit: {}", key);
                    return value;
                }
                Err(e) => tracing::warn!("Discarding unreadable cache entry {}: {}", key, e),
            },
            Ok(None) => tracing::debug!("Cache miss: {}", key),
            Err(e) => tracing::warn!("Cache read failed for {}, fetching live: {}", key, e),
        }

        let value = compute().await;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(e) = self.store.set(&key, bytes, self.ttl).await {
                    tracing::warn!("Cache write failed for {}: {}", key, e);
                }
            }
            Err(e) => tracing::warn!("Cannot serialize cache entry {}: {}", key, e),
        }

        value
    }
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish()
    }
}

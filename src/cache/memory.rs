//! In-process cache store
//!
//! Entries live in a map guarded by an async read/write lock. Expired entries
//! read as misses and are removed on the next access to their key, and every
//! [`DEFAULT_PRUNE_INTERVAL`] writes sweep out expired entries of other keys.

use crate::cache::CacheStore;
use crate::CacheResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Writes between two sweeps of expired entries
pub const DEFAULT_PRUNE_INTERVAL: usize = 256;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache store backed by a process-local map
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    writes: AtomicUsize,
    prune_interval: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_prune_interval(DEFAULT_PRUNE_INTERVAL)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps expired entries every `interval` writes (at least every write)
    pub fn with_prune_interval(interval: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            prune_interval: interval.max(1),
        }
    }

    /// Number of entries held, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: prune unless a writer refreshed it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).map_or(false, |entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let entry = MemoryEntry {
            value,
            expires_at: now + ttl,
        };

        let sweep = (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % self.prune_interval == 0;

        let mut entries = self.entries.write().await;
        if sweep {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            tracing::debug!("Pruned {} expired cache entries", before - entries.len());
        }
        entries.insert(key.to_string(), entry);
        Ok(())
    }
}

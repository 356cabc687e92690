//! SQLite cache store
//!
//! A file-backed store that any number of processes can share. Each `get` and
//! `set` is a single statement, so SQLite's own locking keeps entries intact
//! under concurrent writers. Expired rows are deleted when the file is opened
//! and every [`DEFAULT_PRUNE_INTERVAL`] writes.

use crate::cache::CacheStore;
use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Writes between two deletions of expired rows
pub const DEFAULT_PRUNE_INTERVAL: usize = 256;

const DELETE_EXPIRED_SQL: &str = "DELETE FROM cache_entries WHERE expires_at <= ?1";

/// SQL schema for the cache table
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    expires_at INTEGER NOT NULL,
    written_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_expires ON cache_entries(expires_at);
"#;

/// Cache store backed by a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    writes: Arc<AtomicUsize>,
    prune_interval: usize,
}

impl SqliteStore {
    /// Opens or creates the cache database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(CacheError)` - Failed to open database
    pub fn open(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;

        // Other processes may hold the write lock briefly
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        let purged = conn.execute(DELETE_EXPIRED_SQL, params![Utc::now().timestamp_millis()])?;
        if purged > 0 {
            tracing::debug!("Removed {} expired cache rows from {}", purged, path.display());
        }

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            writes: Arc::new(AtomicUsize::new(0)),
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    /// Deletes expired rows every `interval` writes (at least every write)
    pub fn with_prune_interval(mut self, interval: usize) -> Self {
        self.prune_interval = interval.max(1);
        self
    }

    /// Number of rows held, expired ones included
    pub async fn len(&self) -> CacheResult<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }

    /// Deletes expired rows, returning how many were removed
    pub async fn purge_expired(&self) -> CacheResult<usize> {
        let now = Utc::now().timestamp_millis();
        self.with_conn(move |conn| Ok(conn.execute(DELETE_EXPIRED_SQL, params![now])?))
            .await
    }

    /// Runs a blocking closure against the connection off the async runtime
    async fn with_conn<T, F>(&self, f: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> CacheResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CacheError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| CacheError::Unavailable(format!("cache task failed: {}", e)))?
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let key = key.to_string();
        let now = Utc::now().timestamp_millis();

        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                    params![key, now],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let key = key.to_string();
        let now = Utc::now();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp_millis().saturating_add(ttl_ms);
        let written_at = now.to_rfc3339();
        let now_ms = now.timestamp_millis();
        let sweep = (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % self.prune_interval == 0;

        self.with_conn(move |conn| {
            if sweep {
                let purged = conn.execute(DELETE_EXPIRED_SQL, params![now_ms])?;
                tracing::debug!("Removed {} expired cache rows", purged);
            }

            conn.execute(
                "INSERT INTO cache_entries (key, value, expires_at, written_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at,
                    written_at = excluded.written_at",
                params![key, value, expires_at, written_at],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set("k", b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("k", b"1".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.set("k", b"2".to_vec(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set("k", b"v".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_writes_reclaim_expired_rows_of_other_keys() {
        let store = SqliteStore::open_in_memory().unwrap().with_prune_interval(2);
        store.set("stale", b"1".to_vec(), Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        // Second write triggers the sweep; "stale" is never read again
        store.set("fresh", b"2".to_vec(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_removes_expired_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        let first = SqliteStore::open(&path).unwrap();
        first.set("stale", b"1".to_vec(), Duration::from_millis(10)).await.unwrap();
        first.set("fresh", b"2".to_vec(), Duration::from_secs(60)).await.unwrap();
        drop(first);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
        assert_eq!(reopened.get("fresh").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_entries_visible_across_handles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        let writer = SqliteStore::open(&path).unwrap();
        writer
            .set("shared", b"x".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        // A second connection stands in for another process
        let reader = SqliteStore::open(&path).unwrap();
        assert_eq!(reader.get("shared").await.unwrap(), Some(b"x".to_vec()));
    }
}

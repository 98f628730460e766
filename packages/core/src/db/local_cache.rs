//! Local Persistent Cache
//!
//! String-keyed key-value mirror plus the durable outbound request queue,
//! both backed by a single libsql database file. A page reload (or process
//! restart) resumes from here: the document maps are re-hydrated from the
//! `cache_entries` table and any not-yet-acknowledged mutation batches are
//! drained from `outbound_queue` in insertion order.
//!
//! # Durability Semantics
//!
//! Queue rows are appended and removed one at a time inside single SQL
//! statements, so enqueue/dequeue are atomic across restarts - there is no
//! read-modify-write window on a serialized array. FIFO order is the
//! `AUTOINCREMENT` rowid order.
//!
//! # Readiness
//!
//! The cache becomes available asynchronously after process start.
//! Consumers subscribe to [`LocalCache::ready`] and only read once the
//! signal flips, preferring cache contents over their own cold-start empty
//! state.

use crate::db::error::CacheError;
use libsql::{params, Builder, Connection, Database};
use std::path::PathBuf;
use tokio::sync::watch;

/// Prefix before all stored key names in case cache busting needs to happen
/// at some point.
pub const CACHE_KEY_PREFIX: &str = "v1-";

/// One pending row of the outbound request queue.
#[derive(Debug, Clone)]
pub struct QueueRow {
    pub id: i64,
    pub payload: String,
}

/// Key-value cache and durable queue over one libsql file.
pub struct LocalCache {
    db: Database,
    db_path: PathBuf,
    ready_tx: watch::Sender<bool>,
}

impl LocalCache {
    /// Opens (creating if needed) the cache database and initializes its
    /// schema. The ready signal flips once initialization completes.
    pub async fn open(db_path: PathBuf) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| CacheError::connection_failed(db_path.clone(), e))?;

        let (ready_tx, _) = watch::channel(false);
        let cache = Self {
            db,
            db_path,
            ready_tx,
        };
        cache.init_schema().await?;
        cache.ready_tx.send_replace(true);
        tracing::debug!(path = %cache.db_path.display(), "local cache ready");
        Ok(cache)
    }

    /// Readiness signal; `true` once the schema is initialized.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    fn connect(&self) -> Result<Connection, CacheError> {
        Ok(self.db.connect()?)
    }

    async fn init_schema(&self) -> Result<(), CacheError> {
        let conn = self.connect()?;

        // PRAGMA statements return rows, so query() is used instead of
        // execute().
        for pragma in ["PRAGMA journal_mode = WAL", "PRAGMA busy_timeout = 5000"] {
            let mut stmt = conn.prepare(pragma).await.map_err(|e| {
                CacheError::sql_execution(format!("Failed to prepare '{}': {}", pragma, e))
            })?;
            let _ = stmt.query(()).await.map_err(|e| {
                CacheError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
            })?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            CacheError::sql_execution(format!("Failed to create table 'cache_entries': {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS outbound_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            CacheError::sql_execution(format!("Failed to create table 'outbound_queue': {}", e))
        })?;

        Ok(())
    }

    /// Reads a value by key, or `None` if the key was never written.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![Self::prefixed(key)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    /// Writes (or overwrites) a value at key.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO cache_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![Self::prefixed(key), value],
        )
        .await?;
        Ok(())
    }

    /// Appends a payload to the back of the outbound queue, returning its
    /// row ID.
    pub async fn enqueue(&self, payload: &str) -> Result<i64, CacheError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO outbound_queue (payload) VALUES (?1)",
            params![payload],
        )
        .await?;
        Ok(conn.last_insert_rowid())
    }

    /// Returns the front of the queue without removing it.
    pub async fn peek_front(&self) -> Result<Option<QueueRow>, CacheError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, payload FROM outbound_queue ORDER BY id ASC LIMIT 1",
                (),
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(QueueRow {
                id: row.get::<i64>(0)?,
                payload: row.get::<String>(1)?,
            })),
            None => Ok(None),
        }
    }

    /// Removes one queue row by ID (after its batch was acknowledged).
    pub async fn remove(&self, id: i64) -> Result<(), CacheError> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM outbound_queue WHERE id = ?1", params![id])
            .await?;
        Ok(())
    }

    /// Number of pending queue rows.
    pub async fn queue_len(&self) -> Result<u64, CacheError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM outbound_queue", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Drops every pending queue row. Used after a full authoritative
    /// refresh makes queued mutations moot.
    pub async fn clear_queue(&self) -> Result<(), CacheError> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM outbound_queue", ()).await?;
        Ok(())
    }

    fn prefixed(key: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, key)
    }
}

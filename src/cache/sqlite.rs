//! Embedded `SQLite` cache backend

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use super::{CacheEntry, ResultCache};
use crate::search::{SearchQuery, SearchResults};
use crate::{Error, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type CachePool = Pool<SqliteConnectionManager>;
type CacheConn = PooledConnection<SqliteConnectionManager>;

/// Disk-backed cache on an r2d2 connection pool
///
/// Timestamps are stored as Unix milliseconds. Expired rows are deleted
/// lazily when read, or in bulk by [`ResultCache::purge_expired`].
#[derive(Clone, Debug)]
pub struct SqliteCache {
    pool: CachePool,
}

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::CacheUnavailable(e.to_string())
}

fn init_schema(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS search_cache (
            query TEXT PRIMARY KEY,
            results TEXT NOT NULL,
            stored_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_search_cache_expires ON search_cache(expires_at);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated cache schema to v1");
    Ok(())
}

impl SqliteCache {
    /// Open (or create) a cache database file
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or migrated
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Pooled writers wait on each other's locks instead of failing busy
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(|c| c.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| Error::Database(e.to_string()))?;

        let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
        init_schema(&conn)?;

        tracing::info!(
            path = %path.as_ref().display(),
            version = SCHEMA_VERSION,
            "cache database initialized"
        );
        Ok(Self { pool })
    }

    /// Open an in-memory database (for testing)
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be initialized
    pub fn open_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| Error::Database(e.to_string()))?;

        let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
        init_schema(&conn)?;

        Ok(Self { pool })
    }

    /// Run `f` with a pooled connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CacheConn) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(unavailable)?;
            f(&conn)
        })
        .await
        .map_err(unavailable)?
    }
}

#[async_trait]
impl ResultCache for SqliteCache {
    async fn get(&self, query: &SearchQuery) -> Result<Option<SearchResults>> {
        let key = query.as_str().to_string();
        let now = Utc::now().timestamp_millis();

        let row = self
            .with_conn(move |conn| {
                let row: Option<(String, i64)> = conn
                    .query_row(
                        "SELECT results, expires_at FROM search_cache WHERE query = ?1",
                        [&key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()
                    .map_err(unavailable)?;

                match row {
                    Some((_, expires_at)) if now >= expires_at => {
                        conn.execute(
                            "DELETE FROM search_cache WHERE query = ?1 AND expires_at <= ?2",
                            params![key, now],
                        )
                        .map_err(unavailable)?;
                        Ok(None)
                    }
                    Some((json, _)) => Ok(Some(json)),
                    None => Ok(None),
                }
            })
            .await?;

        let Some(json) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<SearchResults>(&json) {
            Ok(results) => Ok(Some(results)),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "unreadable cache row, treating as miss");
                Ok(None)
            }
        }
    }

    async fn put(
        &self,
        query: &SearchQuery,
        results: &SearchResults,
        ttl: Duration,
    ) -> Result<()> {
        if results.is_empty() {
            tracing::warn!(query = %query, "refusing to cache empty results");
            return Ok(());
        }

        let entry = CacheEntry::new(query.clone(), results.clone(), ttl);
        let json = serde_json::to_string(&entry.results)?;
        let stored_at = entry.stored_at.timestamp_millis();
        let expires_at = entry
            .expires_at()
            .map_or(i64::MAX, |expires| expires.timestamp_millis());
        let key = entry.query.as_str().to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO search_cache (query, results, stored_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, json, stored_at, expires_at],
            )
            .map_err(unavailable)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, query: &SearchQuery) -> Result<()> {
        let key = query.as_str().to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM search_cache WHERE query = ?1", [&key])
                .map_err(unavailable)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        let removed = self
            .with_conn(|conn| {
                conn.execute("DELETE FROM search_cache", [])
                    .map_err(unavailable)
            })
            .await?;

        tracing::info!(removed, "sqlite cache cleared");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let removed = self
            .with_conn(move |conn| {
                conn.execute("DELETE FROM search_cache WHERE expires_at <= ?1", [now])
                    .map_err(unavailable)
            })
            .await?;

        if removed > 0 {
            tracing::debug!(removed, "purged expired cache rows");
        }
        Ok(removed)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

//! Result cache: normalized query to search results, with per-entry expiry
//!
//! Two backends share the [`ResultCache`] trait: an embedded `SQLite` store
//! that survives restarts, and an in-process `mini-moka` store. The backend
//! is picked once at startup by [`open`].

mod memory;
mod sqlite;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::config::CacheConfig;
use crate::search::{SearchHit, SearchQuery, SearchResults};
use crate::{Error, Result};

/// Default entry lifetime (one hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Key used by health checks and benchmarks
pub const HEALTH_PROBE_KEY: &str = "__voxquery_health_probe__";

/// Available cache backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Embedded disk-backed store
    #[default]
    Sqlite,
    /// In-process store, lost on restart
    Memory,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for CacheBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "disk" => Ok(Self::Sqlite),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(Error::Config(format!("unknown cache backend: {other}"))),
        }
    }
}

/// A stored result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub query: SearchQuery,
    pub results: SearchResults,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Stamp `results` with the current time
    #[must_use]
    pub fn new(query: SearchQuery, results: SearchResults, ttl: Duration) -> Self {
        Self {
            query,
            results,
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// Instant after which the entry is no longer served
    ///
    /// `None` when the TTL is too large to represent, which never expires.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.stored_at.checked_add_signed(ttl))
    }

    /// Whether the entry may be served at `now`
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|expires| now < expires)
    }
}

/// Query to result-set store with per-entry expiry
///
/// Implementations never return an expired entry and never store an empty
/// result set. Writes replace any previous entry for the same query as a
/// whole.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Fresh results for `query`, or `None` when absent or expired
    async fn get(&self, query: &SearchQuery) -> Result<Option<SearchResults>>;

    /// Store `results` for `ttl`; empty result sets are ignored
    async fn put(&self, query: &SearchQuery, results: &SearchResults, ttl: Duration)
    -> Result<()>;

    /// Drop the entry for `query`, if any
    async fn remove(&self, query: &SearchQuery) -> Result<()>;

    /// Drop every entry
    async fn clear(&self) -> Result<()>;

    /// Delete every expired entry, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Write then read a probe entry
    async fn health_check(&self) -> bool {
        let Some(probe) = SearchQuery::new(HEALTH_PROBE_KEY) else {
            return false;
        };
        let expected = probe_results();

        let healthy = match self.put(&probe, &expected, Duration::from_secs(60)).await {
            Ok(()) => matches!(self.get(&probe).await, Ok(Some(found)) if found == expected),
            Err(e) => {
                tracing::warn!(backend = self.backend(), error = %e, "cache health probe write failed");
                false
            }
        };

        if let Err(e) = self.remove(&probe).await {
            tracing::debug!(backend = self.backend(), error = %e, "cache health probe cleanup failed");
        }

        tracing::debug!(backend = self.backend(), healthy, "cache health check");
        healthy
    }
}

fn probe_results() -> SearchResults {
    SearchResults::from_hits([SearchHit {
        title: "probe".to_string(),
        snippet: "cache health probe".to_string(),
        url: "about:blank".to_string(),
    }])
}

/// Open the configured backend
///
/// # Errors
///
/// Returns error if the `SQLite` file cannot be opened or migrated
pub fn open(config: &CacheConfig) -> Result<Arc<dyn ResultCache>> {
    let cache: Arc<dyn ResultCache> = match config.backend {
        CacheBackend::Sqlite => {
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteCache::open(&config.path)?)
        }
        CacheBackend::Memory => Arc::new(MemoryCache::new(config.capacity)),
    };

    tracing::info!(backend = cache.backend(), "result cache ready");
    Ok(cache)
}

/// Round-trip timings from [`bench`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchReport {
    pub iterations: u32,
    pub write: Duration,
    pub read: Duration,
}

impl BenchReport {
    /// Mean write latency
    #[must_use]
    pub fn mean_write(&self) -> Duration {
        self.write / self.iterations.max(1)
    }

    /// Mean read latency
    #[must_use]
    pub fn mean_read(&self) -> Duration {
        self.read / self.iterations.max(1)
    }
}

/// Time `iterations` write/read round trips against the probe key
///
/// # Errors
///
/// Returns error if any write or read fails, or a read misses
pub async fn bench(cache: &dyn ResultCache, iterations: u32) -> Result<BenchReport> {
    let probe = SearchQuery::new(HEALTH_PROBE_KEY)
        .ok_or_else(|| Error::CacheUnavailable("invalid probe key".to_string()))?;
    let results = probe_results();

    let mut report = BenchReport {
        iterations,
        write: Duration::ZERO,
        read: Duration::ZERO,
    };

    for _ in 0..iterations {
        let started = Instant::now();
        cache.put(&probe, &results, Duration::from_secs(60)).await?;
        report.write += started.elapsed();

        let started = Instant::now();
        let found = cache.get(&probe).await?;
        report.read += started.elapsed();

        if found.is_none() {
            return Err(Error::CacheUnavailable(
                "probe entry missing right after write".to_string(),
            ));
        }
    }

    cache.remove(&probe).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl: Duration) -> CacheEntry {
        CacheEntry::new(
            SearchQuery::new("cats").unwrap(),
            probe_results(),
            ttl,
        )
    }

    #[test]
    fn entry_fresh_until_expiry() {
        let e = entry(Duration::from_secs(10));
        assert!(e.is_fresh_at(e.stored_at));
        assert!(e.is_fresh_at(e.stored_at + TimeDelta::seconds(9)));
        assert!(!e.is_fresh_at(e.stored_at + TimeDelta::seconds(10)));
    }

    #[test]
    fn zero_ttl_is_never_fresh() {
        let e = entry(Duration::ZERO);
        assert!(!e.is_fresh_at(e.stored_at));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let e = entry(Duration::MAX);
        assert_eq!(e.expires_at(), None);
        assert!(e.is_fresh_at(e.stored_at + TimeDelta::days(365 * 100)));
    }

    #[test]
    fn backend_parsing() {
        assert_eq!("sqlite".parse::<CacheBackend>().unwrap(), CacheBackend::Sqlite);
        assert_eq!("Memory".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        assert!("redis".parse::<CacheBackend>().is_err());
    }

    #[tokio::test]
    async fn bench_runs_against_memory_backend() {
        let cache = MemoryCache::new(16);
        let report = bench(&cache, 5).await.unwrap();
        assert_eq!(report.iterations, 5);
        // Probe is cleaned up afterwards
        let probe = SearchQuery::new(HEALTH_PROBE_KEY).unwrap();
        assert!(cache.get(&probe).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn health_check_default_method() {
        assert!(MemoryCache::new(16).health_check().await);
        assert!(SqliteCache::open_memory().unwrap().health_check().await);
    }
}

//! In-process cache backend

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mini_moka::sync::Cache;

use super::{CacheEntry, ResultCache};
use crate::Result;
use crate::search::{SearchQuery, SearchResults};

/// Default entry capacity
pub const DEFAULT_CAPACITY: u64 = 1024;

/// Bounded in-memory cache
///
/// `mini-moka` evicts by capacity; per-entry expiry is checked on read since
/// each entry carries its own TTL.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Arc<CacheEntry>>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, query: &SearchQuery) -> Result<Option<SearchResults>> {
        let key = query.as_str().to_string();
        let Some(entry) = self.entries.get(&key) else {
            return Ok(None);
        };

        if entry.is_fresh_at(Utc::now()) {
            Ok(Some(entry.results.clone()))
        } else {
            self.entries.invalidate(&key);
            tracing::debug!(query = %query, "expired cache entry dropped");
            Ok(None)
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
        self.entries
            .insert(query.as_str().to_string(), Arc::new(entry));
        Ok(())
    }

    async fn remove(&self, query: &SearchQuery) -> Result<()> {
        self.entries.invalidate(&query.as_str().to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        tracing::info!("memory cache cleared");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_fresh_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &expired {
            self.entries.invalidate(key);
        }
        Ok(expired.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

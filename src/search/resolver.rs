//! Cache-backed, retry-protected query resolution

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::client::{FetchError, SearchClient};
use super::retry::{AttemptOutcome, FetchAttempt, RetryPolicy, timed};
use super::{SearchQuery, SearchResults};
use crate::cache::{DEFAULT_TTL, ResultCache};
use crate::{Error, Result};

/// Where a result set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Upstream,
}

/// Outcome of resolving a query
///
/// `NotFound` is a legitimate empty answer, distinct from a provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        results: SearchResults,
        source: ResultSource,
    },
    NotFound,
}

/// Resolves queries against the cache first, then the provider
pub struct SearchResolver {
    cache: Arc<dyn ResultCache>,
    client: Arc<dyn SearchClient>,
    retry: RetryPolicy,
    ttl: Duration,
}

impl SearchResolver {
    /// Create a resolver with the default retry policy and TTL
    #[must_use]
    pub fn new(cache: Arc<dyn ResultCache>, client: Arc<dyn SearchClient>) -> Self {
        Self {
            cache,
            client,
            retry: RetryPolicy::default(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the TTL used for new cache entries
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cache in use
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    /// Resolve `query` to results
    ///
    /// Cache errors are logged and treated as a miss. Empty or failed
    /// fetches are never cached. At most `retry.max_attempts` provider calls
    /// are made.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyQuery`] if the query is blank
    /// - [`Error::UpstreamUnavailable`] if the provider keeps failing or
    ///   rejects the request
    pub async fn resolve(&self, query: &str) -> Result<Resolution> {
        let query = SearchQuery::new(query).ok_or(Error::EmptyQuery)?;

        match self.cache.get(&query).await {
            Ok(Some(results)) => {
                tracing::info!(query = %query, hits = results.len(), "cache hit");
                return Ok(Resolution::Found {
                    results,
                    source: ResultSource::Cache,
                });
            }
            Ok(None) => tracing::debug!(query = %query, "cache miss"),
            Err(e) => {
                tracing::warn!(
                    query = %query,
                    backend = self.cache.backend(),
                    error = %e,
                    "cache read failed, treating as miss"
                );
            }
        }

        let results = self
            .retry
            .run(
                |attempt| self.fetch_once(&query, attempt),
                FetchError::is_retryable,
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    query = %query,
                    provider = self.client.name(),
                    attempts = e.attempts,
                    exhausted = e.exhausted,
                    error = %e.error,
                    "search failed"
                );
                Error::UpstreamUnavailable(format!(
                    "{} after {} attempt(s)",
                    e.error, e.attempts
                ))
            })?;

        if results.is_empty() {
            tracing::info!(query = %query, "provider returned no results");
            return Ok(Resolution::NotFound);
        }

        if let Err(e) = self.cache.put(&query, &results, self.ttl).await {
            tracing::warn!(
                query = %query,
                backend = self.cache.backend(),
                error = %e,
                "cache write failed"
            );
        }

        tracing::info!(query = %query, hits = results.len(), "resolved from provider");
        Ok(Resolution::Found {
            results,
            source: ResultSource::Upstream,
        })
    }

    async fn fetch_once(
        &self,
        query: &SearchQuery,
        attempt: u32,
    ) -> std::result::Result<SearchResults, FetchError> {
        let (result, latency) = timed(self.client.fetch(query)).await;

        let outcome = match &result {
            Ok(_) => AttemptOutcome::Success,
            Err(e) => e.outcome(),
        };
        FetchAttempt {
            attempt,
            outcome,
            latency,
        }
        .log(query.as_str());

        result
    }
}

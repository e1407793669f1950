//! Search resolution: query normalization, provider client, retry policy
//! and the cache-backed resolver that ties them together

mod client;
mod resolver;
mod retry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use client::{DEFAULT_TIMEOUT, FetchError, SERPAPI_ENDPOINT, SearchClient, SerpApiClient};
pub use resolver::{Resolution, ResultSource, SearchResolver};
pub use retry::{AttemptOutcome, FetchAttempt, RetryError, RetryPolicy};

/// Maximum number of hits kept from a provider response
pub const MAX_RESULTS: usize = 3;

/// A normalized, non-empty search query
///
/// Normalization trims the text, collapses internal whitespace runs to a
/// single space and lowercases it. Two queries share a cache entry exactly
/// when their normalized forms are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Normalize raw text; `None` if nothing is left
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        (!normalized.is_empty()).then_some(Self(normalized))
    }

    /// Normalized text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SearchQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Up to [`MAX_RESULTS`] hits in provider order
///
/// Never re-sorted. Serializes as a plain JSON array, which is also the
/// cache storage format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SearchHit>", into = "Vec<SearchHit>")]
pub struct SearchResults(Vec<SearchHit>);

impl SearchResults {
    /// Keep the first [`MAX_RESULTS`] hits, preserving order
    #[must_use]
    pub fn from_hits(hits: impl IntoIterator<Item = SearchHit>) -> Self {
        Self(hits.into_iter().take(MAX_RESULTS).collect())
    }

    /// Hits in provider order
    #[must_use]
    pub fn hits(&self) -> &[SearchHit] {
        &self.0
    }

    /// Number of hits
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the provider returned nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<SearchHit>> for SearchResults {
    fn from(hits: Vec<SearchHit>) -> Self {
        Self::from_hits(hits)
    }
}

impl From<SearchResults> for Vec<SearchHit> {
    fn from(results: SearchResults) -> Self {
        results.0
    }
}

//! External search provider client
//!
//! One HTTP request per call. Retry lives in the resolver, not here.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::retry::AttemptOutcome;
use super::{SearchHit, SearchQuery, SearchResults};

/// Default `SerpApi` endpoint
pub const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const UNTITLED: &str = "Untitled";
const NO_DESCRIPTION: &str = "No description";
const NO_LINK: &str = "No link";

/// Failure of a single provider call
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The request did not complete within the client timeout
    #[error("search provider timed out")]
    Timeout,

    /// Could not reach the provider
    #[error("search provider unreachable: {0}")]
    Connection(String),

    /// Provider answered with a non-success status
    #[error("search provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider answered 2xx with a body we cannot read
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The request could not be built
    #[error("invalid search request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Whether another attempt could succeed
    ///
    /// Timeouts, connection failures, 5xx and 429 are transient. Everything
    /// else fails the same way on every attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Malformed(_) | Self::InvalidRequest(_) => false,
        }
    }

    /// Attempt outcome for logging
    #[must_use]
    pub const fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Timeout => AttemptOutcome::Timeout,
            Self::Connection(_) => AttemptOutcome::ConnectionError,
            Self::Status { status, .. } => AttemptOutcome::HttpError(*status),
            Self::Malformed(_) | Self::InvalidRequest(_) => AttemptOutcome::Malformed,
        }
    }
}

/// Drops the request URL first: it carries the API key
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() || e.is_request() {
            Self::Connection(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else if e.is_decode() || e.is_body() {
            Self::Malformed(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}

/// A search provider
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Fetch up to [`super::MAX_RESULTS`] hits for `query`
    ///
    /// A 2xx response with no hits is `Ok` with empty results.
    async fn fetch(&self, query: &SearchQuery) -> Result<SearchResults, FetchError>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Option<Vec<OrganicResult>>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| placeholder.to_string())
}

impl From<OrganicResult> for SearchHit {
    fn from(r: OrganicResult) -> Self {
        Self {
            title: or_placeholder(r.title, UNTITLED),
            snippet: or_placeholder(r.snippet, NO_DESCRIPTION),
            url: or_placeholder(r.link, NO_LINK),
        }
    }
}

/// `SerpApi` (Google engine by default) search client
pub struct SerpApiClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
    engine: String,
    language: Option<String>,
    country: Option<String>,
}

impl std::fmt::Debug for SerpApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerpApiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl SerpApiClient {
    /// Create a client against `endpoint`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is blank or the HTTP client cannot be built
    pub fn new(endpoint: Url, api_key: SecretString, timeout: Duration) -> crate::Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(crate::Error::Config(
                "SerpApi API key required (set SERPAPI_API_KEY)".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            engine: "google".to_string(),
            language: None,
            country: None,
        })
    }

    /// Build from the search config section
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the endpoint is not a URL
    pub fn from_config(config: &crate::config::SearchConfig) -> crate::Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            crate::Error::Config("SerpApi API key required (set SERPAPI_API_KEY)".to_string())
        })?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| crate::Error::Config(format!("search endpoint: {e}")))?;

        let mut client = Self::new(endpoint, api_key, config.timeout)?.with_engine(&config.engine);
        client.language = config.language.clone();
        client.country = config.country.clone();
        Ok(client)
    }

    /// Use a different `SerpApi` engine
    #[must_use]
    pub fn with_engine(mut self, engine: &str) -> Self {
        self.engine = engine.to_string();
        self
    }

    /// Set interface language (`hl`) and country (`gl`)
    #[must_use]
    pub fn with_locale(mut self, language: Option<&str>, country: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self.country = country.map(str::to_string);
        self
    }
}

#[async_trait]
impl SearchClient for SerpApiClient {
    async fn fetch(&self, query: &SearchQuery) -> Result<SearchResults, FetchError> {
        let mut params = vec![
            ("q", query.as_str()),
            ("api_key", self.api_key.expose_secret()),
            ("engine", self.engine.as_str()),
        ];
        if let Some(hl) = &self.language {
            params.push(("hl", hl.as_str()));
        }
        if let Some(gl) = &self.country {
            params.push(("gl", gl.as_str()));
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: SerpResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let results = SearchResults::from_hits(
            parsed
                .organic_results
                .unwrap_or_default()
                .into_iter()
                .map(SearchHit::from),
        );

        tracing::debug!(query = %query, hits = results.len(), "serpapi response parsed");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "serpapi"
    }
}

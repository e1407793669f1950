//! Error types for the voice query pipeline

use thiserror::Error;

use crate::audio::InvalidReason;

/// Result type alias for voxquery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while answering a voice query
///
/// Every variant is scoped to a single request; none of them is fatal to the
/// process.
#[derive(Debug, Error)]
pub enum Error {
    /// Audio failed validation (malformed, oversized, unsupported or silent)
    #[error("{0}")]
    Validation(InvalidReason),

    /// Audio could not be converted to the transcription format
    #[error("audio conversion failed: {0}")]
    Conversion(String),

    /// Speech-to-text failed
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Transcript contained nothing usable as a search query
    #[error("no search intent found in transcript")]
    EmptyIntent,

    /// Query was empty or whitespace-only
    #[error("search query is empty")]
    EmptyQuery,

    /// Search provider unreachable after retries, or rejected the request
    #[error("search provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Result cache backend unreachable
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Text-to-speech failed
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio decoding or encoding error outside of validation
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Database pool error
    #[error("database error: {0}")]
    Database(String),
}

impl From<InvalidReason> for Error {
    fn from(reason: InvalidReason) -> Self {
        Self::Validation(reason)
    }
}

impl Error {
    /// Stable machine-readable code used in API error bodies
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_audio",
            Self::Conversion(_) => "conversion_failed",
            Self::TranscriptionFailed(_) => "transcription_failed",
            Self::EmptyIntent => "empty_intent",
            Self::EmptyQuery => "empty_query",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::SynthesisFailed(_) => "synthesis_failed",
            Self::Config(_) => "config_error",
            Self::Audio(_)
            | Self::Io(_)
            | Self::Http(_)
            | Self::Serialization(_)
            | Self::Toml(_)
            | Self::Sqlite(_)
            | Self::Database(_) => "internal_error",
        }
    }
}

//! Voxquery - spoken search queries answered with spoken results
//!
//! This library provides the pieces of the voice query pipeline:
//! - Audio validation and format normalization
//! - Speech-to-text and text-to-speech adapters
//! - Search intent extraction from transcripts
//! - Web search with retries and a TTL result cache
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                       │
//! │        HTTP API (/process-audio)  │  CLI            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Pipeline                         │
//! │   Validate │ Normalize │ STT │ Intent │ TTS         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 SearchResolver                      │
//! │   ResultCache (SQLite/memory)  │  SerpApi + retry   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod intent;
pub mod pipeline;
pub mod search;
pub mod voice;

pub use audio::{AudioBlob, AudioValidator, FormatNormalizer, InvalidReason, ValidationVerdict};
pub use cache::{CacheBackend, ResultCache};
pub use config::Config;
pub use error::{Error, Result};
pub use intent::{Intent, IntentExtractor, IntentSource};
pub use pipeline::{Answer, Pipeline, PipelineOptions, PipelineOutcome};
pub use search::{
    Resolution, ResultSource, RetryPolicy, SearchClient, SearchHit, SearchQuery, SearchResolver,
    SearchResults, SerpApiClient,
};
pub use voice::{SpeechToText, Synthesizer, TextToSpeech, Transcriber};

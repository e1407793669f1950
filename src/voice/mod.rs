//! Speech collaborators
//!
//! The pipeline only sees the [`Transcriber`] and [`Synthesizer`] traits.
//! HTTP adapters for hosted providers live in `stt` and `tts`.

mod stt;
mod tts;

use async_trait::async_trait;

pub use stt::{SpeechToText, SttProvider};
pub use tts::{TextToSpeech, TtsProvider};

use crate::Result;
use crate::audio::AudioBlob;

/// Speech-to-text engine
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` to text
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TranscriptionFailed`] when the engine fails
    async fn transcribe(&self, audio: &AudioBlob) -> Result<String>;

    /// Engine name for logs
    fn name(&self) -> &'static str;
}

/// Text-to-speech engine
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` to encoded audio
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SynthesisFailed`] when the engine fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// MIME type of the synthesized audio
    fn mime_type(&self) -> &'static str {
        "audio/mpeg"
    }

    /// Engine name for logs
    fn name(&self) -> &'static str;
}

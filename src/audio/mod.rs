//! Audio intake: uploaded blobs, validation and format normalization
//!
//! A blob enters the pipeline exactly once per request and is owned by it
//! until transcription finishes. Nothing here mutates a blob in place; the
//! normalizer always produces a new one.

mod convert;
mod probe;
mod validator;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use convert::{FormatNormalizer, TargetFormat, samples_to_wav};
pub use probe::{AudioInfo, Codec, Levels, inspect};
pub use validator::{AudioValidator, InvalidReason, ValidationVerdict, ValidatorConfig};

use crate::Result;

/// Default upper bound for an uploaded blob (10 MiB)
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Container families accepted at ingress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Ogg,
    Mp3,
    Wav,
    Flac,
    Aac,
}

impl AudioFormat {
    /// Map a declared MIME type onto an accepted container
    ///
    /// Parameters such as `; codecs=vorbis` are ignored. Returns `None` for
    /// anything outside the allow-list, including non-audio types.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "audio/ogg" | "audio/vorbis" | "audio/x-vorbis+ogg" => Some(Self::Ogg),
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg-3" => Some(Self::Mp3),
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some(Self::Wav),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/aac" | "audio/x-aac" | "audio/aacp" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Guess a container from a file extension
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ogg" | "oga" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "wav" | "wave" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            "aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Canonical MIME type for this container
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
            Self::Aac => "audio/aac",
        }
    }

    /// Canonical file extension, used as a probe hint
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Aac => "aac",
        }
    }
}

/// An uploaded audio payload with its declared MIME type
///
/// Not `Clone`. The pipeline owns a blob for one request and drops it on
/// every exit path.
#[derive(Debug)]
pub struct AudioBlob {
    data: Vec<u8>,
    mime_type: String,
}

impl AudioBlob {
    /// Wrap raw bytes and their declared MIME type
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Read a blob from disk, guessing the MIME type from the extension
    ///
    /// Unknown extensions get `application/octet-stream`, which the validator
    /// rejects with a MIME reason.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
            .map_or("application/octet-stream", AudioFormat::mime_type);

        Ok(Self::new(data, mime_type))
    }

    /// Raw bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared MIME type, as received
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the blob carries no bytes at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Accepted container for the declared MIME type, if any
    #[must_use]
    pub fn format(&self) -> Option<AudioFormat> {
        AudioFormat::from_mime(&self.mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_aliases_map_to_containers() {
        assert_eq!(AudioFormat::from_mime("audio/x-wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_mime("audio/mp3"), Some(AudioFormat::Mp3));
        assert_eq!(
            AudioFormat::from_mime("audio/ogg; codecs=vorbis"),
            Some(AudioFormat::Ogg)
        );
        assert_eq!(AudioFormat::from_mime("AUDIO/FLAC"), Some(AudioFormat::Flac));
    }

    #[test]
    fn non_audio_and_unlisted_mimes_are_rejected() {
        assert_eq!(AudioFormat::from_mime("video/mp4"), None);
        assert_eq!(AudioFormat::from_mime("audio/webm"), None);
        assert_eq!(AudioFormat::from_mime(""), None);
    }

    #[test]
    fn from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.flac");
        std::fs::write(&path, b"fLaC").unwrap();

        let blob = AudioBlob::from_path(&path).unwrap();
        assert_eq!(blob.mime_type(), "audio/flac");
        assert_eq!(blob.len(), 4);

        let other = dir.path().join("notes.txt");
        std::fs::write(&other, b"hi").unwrap();
        let blob = AudioBlob::from_path(&other).unwrap();
        assert_eq!(blob.format(), None);
    }
}

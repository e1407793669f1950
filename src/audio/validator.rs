//! Staged validity checks that gate audio before transcription
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. non-empty content
//! 2. declared MIME type is audio and on the allow-list
//! 3. size within the configured limit
//! 4. container and packets decode
//! 5. minimum duration
//! 6. codec within the supported set
//! 7. not silent (a warning, never a hard failure)
//!
//! After the checks pass, a blob that is not already in the transcription
//! engine's required format is reported as needing conversion.

use std::time::Duration;

use thiserror::Error;

use super::{AudioBlob, AudioFormat, AudioInfo, Codec, DEFAULT_MAX_AUDIO_BYTES, TargetFormat, probe};

const MIB: usize = 1024 * 1024;

/// Why a blob was turned away
///
/// The `Display` text is shown to end users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("no audio data was received")]
    Empty,

    #[error("unsupported file type '{0}': send an ogg, mp3, wav, flac or aac audio file")]
    UnsupportedMime(String),

    #[error("audio file is too large: {} bytes exceeds the {} MiB limit", .size, .limit / MIB)]
    TooLarge { size: usize, limit: usize },

    #[error("audio file is corrupted or unreadable ({0})")]
    Undecodable(String),

    #[error("audio is too short to process ({} ms)", .duration.as_millis())]
    TooShort { duration: Duration },

    #[error("unsupported audio codec: {0}")]
    UnsupportedCodec(String),

    #[error("audio is silent or its volume is too low")]
    Silent,
}

/// The validator's classification of one blob
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationVerdict {
    /// Usable as-is
    Valid { info: AudioInfo },
    /// Usable once converted to `target`
    ValidNeedsConversion { info: AudioInfo, target: TargetFormat },
    /// Structurally fine but probably silent; the caller decides
    Warning {
        info: AudioInfo,
        reason: InvalidReason,
        target: Option<TargetFormat>,
    },
    /// Rejected
    Invalid { reason: InvalidReason },
}

impl ValidationVerdict {
    /// Whether the blob may proceed without caller judgement
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. } | Self::ValidNeedsConversion { .. })
    }

    /// Short label for logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Valid { .. } => "valid",
            Self::ValidNeedsConversion { .. } => "needs_conversion",
            Self::Warning { .. } => "warning",
            Self::Invalid { .. } => "invalid",
        }
    }
}

/// Validator thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    /// Maximum accepted blob size in bytes
    pub max_bytes: usize,
    /// Audio must be longer than this
    pub min_duration: Duration,
    /// Peak amplitude at or below this is treated as silence
    pub silence_threshold: f32,
    /// Format the transcription engine requires, if any
    pub required_format: Option<TargetFormat>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_AUDIO_BYTES,
            min_duration: Duration::from_millis(100),
            silence_threshold: 0.001,
            required_format: Some(TargetFormat::default()),
        }
    }
}

/// Runs the staged checks; never mutates the blob
#[derive(Debug, Clone, Default)]
pub struct AudioValidator {
    config: ValidatorConfig,
}

impl AudioValidator {
    /// Create a validator with the given thresholds
    #[must_use]
    pub const fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Thresholds in effect
    #[must_use]
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Classify a blob
    #[must_use]
    pub fn validate(&self, blob: &AudioBlob) -> ValidationVerdict {
        let verdict = self.run_checks(blob);

        match &verdict {
            ValidationVerdict::Invalid { reason } => {
                tracing::warn!(
                    mime = blob.mime_type(),
                    bytes = blob.len(),
                    reason = %reason,
                    "audio rejected"
                );
            }
            ValidationVerdict::Warning { reason, .. } => {
                tracing::warn!(mime = blob.mime_type(), reason = %reason, "audio accepted with warning");
            }
            ValidationVerdict::Valid { info } | ValidationVerdict::ValidNeedsConversion { info, .. } => {
                tracing::info!(
                    mime = blob.mime_type(),
                    codec = %info.codec,
                    sample_rate = info.sample_rate,
                    channels = info.channels,
                    duration_ms = info.duration.map(|d| d.as_millis()),
                    verdict = verdict.label(),
                    "audio validated"
                );
            }
        }

        verdict
    }

    fn run_checks(&self, blob: &AudioBlob) -> ValidationVerdict {
        let invalid = |reason| ValidationVerdict::Invalid { reason };

        // 1. Content
        if blob.is_empty() {
            return invalid(InvalidReason::Empty);
        }

        // 2. Declared type
        let Some(format) = blob.format() else {
            return invalid(InvalidReason::UnsupportedMime(blob.mime_type().to_string()));
        };

        // 3. Size
        if blob.len() > self.config.max_bytes {
            return invalid(InvalidReason::TooLarge {
                size: blob.len(),
                limit: self.config.max_bytes,
            });
        }

        // 4. Decodability
        let info = match probe::inspect(blob.data(), Some(format)) {
            Ok(info) => info,
            Err(e) => return invalid(InvalidReason::Undecodable(e)),
        };

        // 5. Duration
        if let Some(duration) = info.duration {
            if duration <= self.config.min_duration {
                return invalid(InvalidReason::TooShort { duration });
            }
        }

        // 6. Codec
        if !info.codec.is_supported() {
            return invalid(InvalidReason::UnsupportedCodec(info.codec.to_string()));
        }

        let target = self.conversion_target(format, &info);

        // 7. Silence
        if info
            .levels
            .is_some_and(|l| l.peak <= self.config.silence_threshold)
        {
            return ValidationVerdict::Warning {
                info,
                reason: InvalidReason::Silent,
                target,
            };
        }

        match target {
            Some(target) => ValidationVerdict::ValidNeedsConversion { info, target },
            None => ValidationVerdict::Valid { info },
        }
    }

    /// Conversion the engine needs for this blob, if any
    fn conversion_target(&self, format: AudioFormat, info: &AudioInfo) -> Option<TargetFormat> {
        let required = self.config.required_format?;

        let already_matches = format == AudioFormat::Wav
            && info.codec == Codec::Pcm
            && info.channels == 1
            && info.sample_rate == required.sample_rate;

        (!already_matches).then_some(required)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::audio::samples_to_wav;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn tone(sample_rate: u32, secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn wav_blob(sample_rate: u32, secs: f32, amplitude: f32) -> AudioBlob {
        AudioBlob::new(
            samples_to_wav(&tone(sample_rate, secs, amplitude), sample_rate).unwrap(),
            "audio/wav",
        )
    }

    fn float_stereo_wav(sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                #[allow(clippy::cast_precision_loss)]
                let s = ((i % 50) as f32 / 50.0) - 0.5;
                writer.write_sample(s).unwrap();
                writer.write_sample(-s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn reason(verdict: ValidationVerdict) -> InvalidReason {
        match verdict {
            ValidationVerdict::Invalid { reason } => reason,
            other => panic!("expected invalid verdict, got {other:?}"),
        }
    }

    #[test]
    fn speech_format_wav_is_valid() {
        let verdict = AudioValidator::default().validate(&wav_blob(16_000, 1.0, 0.4));
        assert!(matches!(verdict, ValidationVerdict::Valid { .. }), "{verdict:?}");
    }

    #[test]
    fn other_rates_need_conversion() {
        let verdict = AudioValidator::default().validate(&wav_blob(44_100, 0.5, 0.4));
        match verdict {
            ValidationVerdict::ValidNeedsConversion { target, info } => {
                assert_eq!(target.sample_rate, 16_000);
                assert_eq!(info.sample_rate, 44_100);
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn stereo_float_wav_needs_conversion() {
        let blob = AudioBlob::new(float_stereo_wav(16_000, 8_000), "audio/x-wav");
        let verdict = AudioValidator::default().validate(&blob);
        assert!(
            matches!(verdict, ValidationVerdict::ValidNeedsConversion { .. }),
            "{verdict:?}"
        );
    }

    #[test]
    fn no_required_format_means_no_conversion() {
        let validator = AudioValidator::new(ValidatorConfig {
            required_format: None,
            ..ValidatorConfig::default()
        });
        let verdict = validator.validate(&wav_blob(44_100, 0.5, 0.4));
        assert!(matches!(verdict, ValidationVerdict::Valid { .. }));
    }

    #[test]
    fn empty_blob_is_rejected_first() {
        let blob = AudioBlob::new(Vec::new(), "text/plain");
        assert_eq!(reason(AudioValidator::default().validate(&blob)), InvalidReason::Empty);
    }

    #[test]
    fn non_audio_mime_is_rejected() {
        let blob = AudioBlob::new(vec![1, 2, 3], "application/pdf");
        assert_eq!(
            reason(AudioValidator::default().validate(&blob)),
            InvalidReason::UnsupportedMime("application/pdf".to_string())
        );
    }

    #[test]
    fn oversize_is_rejected_before_decoding() {
        // Garbage content would otherwise fail check 4
        let size = DEFAULT_MAX_AUDIO_BYTES + 1;
        let blob = AudioBlob::new(vec![0u8; size], "audio/mpeg");
        assert_eq!(
            reason(AudioValidator::default().validate(&blob)),
            InvalidReason::TooLarge {
                size,
                limit: DEFAULT_MAX_AUDIO_BYTES
            }
        );
    }

    #[test]
    fn oversize_valid_audio_is_still_rejected() {
        let validator = AudioValidator::new(ValidatorConfig {
            max_bytes: 1024,
            ..ValidatorConfig::default()
        });
        let verdict = validator.validate(&wav_blob(16_000, 1.0, 0.4));
        assert!(matches!(reason(verdict), InvalidReason::TooLarge { .. }));
    }

    #[test]
    fn corrupt_container_is_undecodable() {
        let blob = AudioBlob::new(b"RIFF\x00\x00\x00\x00WAVEjunkjunkjunk".to_vec(), "audio/wav");
        assert!(matches!(
            reason(AudioValidator::default().validate(&blob)),
            InvalidReason::Undecodable(_)
        ));
    }

    #[test]
    fn very_short_audio_is_rejected() {
        let verdict = AudioValidator::default().validate(&wav_blob(16_000, 0.05, 0.4));
        assert!(matches!(reason(verdict), InvalidReason::TooShort { .. }));
    }

    #[test]
    fn silence_is_a_warning_not_a_failure() {
        let verdict = AudioValidator::default().validate(&wav_blob(16_000, 1.0, 0.0));
        match verdict {
            ValidationVerdict::Warning { reason, target, .. } => {
                assert_eq!(reason, InvalidReason::Silent);
                assert_eq!(target, None);
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn reasons_are_distinct_and_readable() {
        let too_large = InvalidReason::TooLarge {
            size: 15 * MIB,
            limit: 10 * MIB,
        };
        assert!(too_large.to_string().contains("10 MiB"));
        assert!(
            InvalidReason::TooShort {
                duration: Duration::from_millis(50)
            }
            .to_string()
            .contains("50 ms")
        );
        assert_ne!(InvalidReason::Empty.to_string(), InvalidReason::Silent.to_string());
    }
}

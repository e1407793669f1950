//! Format normalization to the transcription engine's input format

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::{AudioBlob, AudioFormat, probe};
use crate::{Error, Result};

/// Sample rate most speech engines expect (16kHz)
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;

/// Normalizer output: 16-bit mono PCM WAV at `sample_rate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormat {
    pub sample_rate: u32,
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self {
            sample_rate: SPEECH_SAMPLE_RATE,
        }
    }
}

/// Converts blobs into the engine's required format
///
/// Stateless; holds nothing between requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatNormalizer;

impl FormatNormalizer {
    /// Decode `blob`, downmix, resample and re-encode as PCM WAV
    ///
    /// The input is only borrowed; the returned blob is new.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if decoding, resampling or encoding fails
    pub fn convert(&self, blob: &AudioBlob, target: TargetFormat) -> Result<AudioBlob> {
        let (samples, source_rate) =
            probe::decode_mono(blob.data(), blob.format()).map_err(Error::Conversion)?;

        let samples = if source_rate == target.sample_rate {
            samples
        } else {
            resample(&samples, source_rate, target.sample_rate)?
        };

        let wav = samples_to_wav(&samples, target.sample_rate)
            .map_err(|e| Error::Conversion(e.to_string()))?;

        tracing::debug!(
            from_mime = blob.mime_type(),
            from_bytes = blob.len(),
            to_bytes = wav.len(),
            from_rate = source_rate,
            to_rate = target.sample_rate,
            "audio normalized to PCM WAV"
        );

        Ok(AudioBlob::new(wav, AudioFormat::Wav.mime_type()))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| Error::Conversion(format!("resampler init: {e}")))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let result = resampler
            .process(&[input], None)
            .map_err(|e| Error::Conversion(format!("resample: {e}")))?;

        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    // Padding of the final chunk produces a short tail of silence
    let expected_len = (samples.len() as f64 * ratio) as usize;
    output.truncate(expected_len);

    Ok(output)
}

/// Encode f32 samples as 16-bit mono PCM WAV
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

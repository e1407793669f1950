//! Container probing and packet decoding

use std::fmt;
use std::io::Cursor;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CODEC_TYPE_ALAC, CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_NULL, CODEC_TYPE_OPUS,
    CODEC_TYPE_SPEEX, CODEC_TYPE_WAVPACK, CodecParameters, CodecType, DecoderOptions,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::AudioFormat;

/// Codec families the pipeline distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Codec {
    Pcm,
    Mp3,
    Aac,
    Vorbis,
    Flac,
    /// Anything else, by decoder short name (or "unknown")
    Other(String),
}

impl Codec {
    /// Classify a decoder short name such as `pcm_s16le` or `vorbis`
    #[must_use]
    pub fn from_short_name(name: &str) -> Self {
        match name {
            n if n.starts_with("pcm") => Self::Pcm,
            "mp3" => Self::Mp3,
            "aac" => Self::Aac,
            "vorbis" => Self::Vorbis,
            "flac" => Self::Flac,
            other => Self::Other(other.to_string()),
        }
    }

    fn from_params(params: &CodecParameters) -> Self {
        if let Some(descriptor) = symphonia::default::get_codecs().get_codec(params.codec) {
            return Self::from_short_name(descriptor.short_name);
        }

        // Known to the demuxer but without a decoder
        match undecodable_codec_name(params.codec) {
            Some(name) => Self::Other(name.to_string()),
            None => Self::Other(format!("unrecognized ({:?})", params.codec)),
        }
    }

    /// Whether the codec is in the supported set (pcm, mp3, aac, vorbis, flac)
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

fn undecodable_codec_name(codec: CodecType) -> Option<&'static str> {
    match codec {
        CODEC_TYPE_OPUS => Some("opus"),
        CODEC_TYPE_SPEEX => Some("speex"),
        CODEC_TYPE_WAVPACK => Some("wavpack"),
        CODEC_TYPE_ALAC => Some("alac"),
        CODEC_TYPE_MP1 => Some("mp1"),
        CODEC_TYPE_MP2 => Some("mp2"),
        _ => None,
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm => f.write_str("pcm"),
            Self::Mp3 => f.write_str("mp3"),
            Self::Aac => f.write_str("aac"),
            Self::Vorbis => f.write_str("vorbis"),
            Self::Flac => f.write_str("flac"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Signal level summary over every decoded sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    /// Peak absolute amplitude, 0.0 to 1.0
    pub peak: f32,
    /// Root mean square amplitude, 0.0 to 1.0
    pub rms: f32,
}

/// What probing a blob revealed
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: usize,
    /// `None` only when the codec could not be decoded and the container
    /// did not declare a frame count
    pub duration: Option<Duration>,
    /// `None` when the codec is outside the supported set (not decoded)
    pub levels: Option<Levels>,
}

impl fmt::Display for AudioInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} Hz, {} ch", self.codec, self.sample_rate, self.channels)?;
        if let Some(duration) = self.duration {
            write!(f, ", {} ms", duration.as_millis())?;
        }
        if let Some(levels) = self.levels {
            write!(f, ", peak {:.3}", levels.peak)?;
        }
        Ok(())
    }
}

/// An opened container positioned at its first audio track
pub(crate) struct Stream {
    reader: Box<dyn FormatReader>,
    track_id: u32,
    params: CodecParameters,
    codec: Codec,
}

/// Totals from a full decode pass
#[derive(Debug, Clone, Copy)]
pub(crate) struct Decoded {
    pub frames: u64,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Probe the container and select the first track with a real codec
pub(crate) fn open(data: &[u8], format: Option<AudioFormat>) -> Result<Stream, String> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(format) = format {
        hint.with_extension(format.extension());
        hint.mime_type(format.mime_type());
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("probe: {e}"))?;

    let reader = probed.format;
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no audio track found".to_string())?;

    let track_id = track.id;
    let params = track.codec_params.clone();
    let codec = Codec::from_params(&params);

    Ok(Stream {
        reader,
        track_id,
        params,
        codec,
    })
}

impl Stream {
    /// Decode every packet, handing interleaved f32 samples to `sink`
    ///
    /// Individually corrupt frames are skipped; the pass fails only on
    /// container errors or when nothing at all decodes.
    pub(crate) fn decode(mut self, mut sink: impl FnMut(&[f32], usize)) -> Result<Decoded, String> {
        let mut decoder = symphonia::default::get_codecs()
            .make(&self.params, &DecoderOptions::default())
            .map_err(|e| format!("codec: {e}"))?;

        let mut sample_rate = self.params.sample_rate;
        let mut channels = self.params.channels.map(|c| c.count());
        let mut frames: u64 = 0;
        let mut corrupt: usize = 0;

        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(format!("packet: {e}")),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    corrupt += 1;
                    tracing::debug!(error = %e, "skipping corrupt audio frame");
                    continue;
                }
                Err(e) => return Err(format!("decode: {e}")),
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            if num_frames == 0 {
                continue;
            }

            let frame_channels = spec.channels.count();
            sample_rate.get_or_insert(spec.rate);
            channels.get_or_insert(frame_channels);

            let mut buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            buf.copy_interleaved_ref(decoded);
            sink(buf.samples(), frame_channels);

            frames += num_frames as u64;
        }

        if frames == 0 {
            return Err(if corrupt > 0 {
                format!("{corrupt} corrupt frame(s) and no decodable audio")
            } else {
                "no audio samples decoded".to_string()
            });
        }

        let sample_rate = sample_rate.ok_or_else(|| "unknown sample rate".to_string())?;

        Ok(Decoded {
            frames,
            sample_rate,
            channels: channels.unwrap_or(1),
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn frames_to_duration(frames: u64, sample_rate: u32) -> Option<Duration> {
    (sample_rate > 0).then(|| Duration::from_secs_f64(frames as f64 / f64::from(sample_rate)))
}

/// Probe a blob and, when its codec is supported, decode it fully
///
/// # Errors
///
/// Returns a description of the failure when the container cannot be parsed
/// or its audio cannot be decoded
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn inspect(data: &[u8], format: Option<AudioFormat>) -> Result<AudioInfo, String> {
    let stream = open(data, format)?;
    let codec = stream.codec.clone();

    if !codec.is_supported() {
        let sample_rate = stream.params.sample_rate.unwrap_or(0);
        return Ok(AudioInfo {
            duration: stream
                .params
                .n_frames
                .and_then(|n| frames_to_duration(n, sample_rate)),
            channels: stream.params.channels.map_or(0, |c| c.count()),
            codec,
            sample_rate,
            levels: None,
        });
    }

    let mut peak = 0.0f32;
    let mut sum_sq = 0.0f64;
    let mut count: u64 = 0;

    let decoded = stream.decode(|samples, _| {
        for &s in samples {
            peak = peak.max(s.abs());
            sum_sq += f64::from(s) * f64::from(s);
            count += 1;
        }
    })?;

    let rms = if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt() as f32
    };

    Ok(AudioInfo {
        codec,
        sample_rate: decoded.sample_rate,
        channels: decoded.channels,
        duration: frames_to_duration(decoded.frames, decoded.sample_rate),
        levels: Some(Levels { peak, rms }),
    })
}

/// Decode a blob to mono f32 samples, returning them with their sample rate
#[allow(clippy::cast_precision_loss)]
pub(crate) fn decode_mono(data: &[u8], format: Option<AudioFormat>) -> Result<(Vec<f32>, u32), String> {
    let stream = open(data, format)?;
    let mut mono = Vec::new();

    let decoded = stream.decode(|samples, channels| {
        if channels > 1 {
            for frame in samples.chunks(channels) {
                mono.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            mono.extend_from_slice(samples);
        }
    })?;

    Ok((mono, decoded.sample_rate))
}

//! TOML configuration file loading
//!
//! Supports `~/.config/voxquery/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoxqueryConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub intent: IntentFileConfig,

    #[serde(default)]
    pub cache: CacheFileConfig,

    #[serde(default)]
    pub search: SearchFileConfig,

    #[serde(default)]
    pub retry: RetryFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Audio validation configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Maximum upload size in bytes
    pub max_bytes: Option<usize>,
    /// Minimum duration in milliseconds
    pub min_duration_ms: Option<u64>,
    /// Peak amplitude (0.0-1.0) at or below which audio counts as silent
    pub silence_threshold: Option<f32>,
    /// Sample rate the transcription engine expects
    pub sample_rate: Option<u32>,
    /// Transcribe silent audio instead of rejecting it
    pub allow_silent: Option<bool>,
}

/// Intent extraction configuration
#[derive(Debug, Default, Deserialize)]
pub struct IntentFileConfig {
    /// Command phrases in priority order (replaces the built-in list)
    pub commands: Option<Vec<String>>,
}

/// Result cache configuration
#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    /// "sqlite" or "memory"
    pub backend: Option<String>,
    /// `SQLite` database file
    pub path: Option<String>,
    /// Entry lifetime in seconds
    pub ttl_secs: Option<u64>,
    /// Maximum entries for the memory backend
    pub capacity: Option<u64>,
}

/// Search provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct SearchFileConfig {
    pub endpoint: Option<String>,
    /// `SerpApi` engine (e.g. "google")
    pub engine: Option<String>,
    /// Interface language (`hl`)
    pub language: Option<String>,
    /// Country (`gl`)
    pub country: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Retry policy configuration
#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

/// Speech engine configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Spoken language (BCP 47, e.g. "pt-BR")
    pub language: Option<String>,

    /// "whisper" or "deepgram"
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    pub stt_endpoint: Option<String>,

    /// "openai" or "elevenlabs"
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    pub tts_endpoint: Option<String>,

    /// Spoken response; `{query}` and `{count}` are substituted
    pub response_template: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub serpapi: Option<String>,
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from `path`
///
/// Returns `VoxqueryConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: &Path) -> VoxqueryConfigFile {
    if !path.exists() {
        return VoxqueryConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoxqueryConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoxqueryConfigFile::default()
        }
    }
}

/// Return the config file path: `$VOXQUERY_CONFIG` or `~/.config/voxquery/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("VOXQUERY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxquery").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_is_default() {
        let fc = load_config_file(Path::new("/nonexistent/voxquery/config.toml"));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn partial_file_overlays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 9000

            [cache]
            backend = "memory"
            ttl_secs = 60

            [intent]
            commands = ["tell me about"]
            "#
        )
        .unwrap();

        let fc = load_config_file(file.path());
        assert_eq!(fc.server.port, Some(9000));
        assert_eq!(fc.cache.backend.as_deref(), Some("memory"));
        assert_eq!(fc.cache.ttl_secs, Some(60));
        assert_eq!(fc.intent.commands, Some(vec!["tell me about".to_string()]));
        assert!(fc.voice.language.is_none());
    }

    #[test]
    fn invalid_file_falls_back_to_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let fc = load_config_file(file.path());
        assert!(fc.server.port.is_none());
    }
}

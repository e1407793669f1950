//! Configuration management
//!
//! Precedence is env > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::audio::{AudioValidator, DEFAULT_MAX_AUDIO_BYTES, TargetFormat, ValidatorConfig};
use crate::cache::{CacheBackend, DEFAULT_TTL};
use crate::search::RetryPolicy;
use crate::voice::{SttProvider, TtsProvider};
use crate::{Error, Result};

use self::file::VoxqueryConfigFile;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Service configuration
#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    /// Custom intent commands; `None` uses the built-in list
    pub intent_commands: Option<Vec<String>>,
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub retry: RetryPolicy,
    pub voice: VoiceConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Audio validation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub max_bytes: usize,
    pub min_duration: Duration,
    pub silence_threshold: f32,
    /// Sample rate the transcription engine expects
    pub sample_rate: u32,
    /// Transcribe silent audio instead of rejecting it
    pub allow_silent: bool,
}

impl AudioConfig {
    /// Validator with these thresholds
    #[must_use]
    pub fn validator(&self) -> AudioValidator {
        AudioValidator::new(ValidatorConfig {
            max_bytes: self.max_bytes,
            min_duration: self.min_duration,
            silence_threshold: self.silence_threshold,
            required_format: Some(TargetFormat {
                sample_rate: self.sample_rate,
            }),
        })
    }
}

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// `SQLite` database file (ignored by the memory backend)
    pub path: PathBuf,
    pub ttl: Duration,
    /// Maximum entries for the memory backend
    pub capacity: u64,
}

/// Search provider configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: Option<SecretString>,
    pub engine: String,
    pub language: Option<String>,
    pub country: Option<String>,
    pub timeout: Duration,
}

/// Speech engine configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Spoken language (BCP 47)
    pub language: String,
    pub stt_provider: SttProvider,
    pub stt_model: String,
    pub stt_endpoint: Option<String>,
    pub tts_provider: TtsProvider,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f32,
    pub tts_endpoint: Option<String>,
    pub response_template: Option<String>,
    pub openai_api_key: Option<SecretString>,
    pub deepgram_api_key: Option<SecretString>,
    pub elevenlabs_api_key: Option<SecretString>,
}

/// Default cache database: `~/.local/share/voxquery/cache.db` on Linux
fn default_cache_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("voxquery-cache.db"),
        |d| d.data_dir().join("voxquery").join("cache.db"),
    )
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
    }
    parsed
}

fn env_bool(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = env(key)?;
    let parsed = parse_bool(&raw);
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
    }
    parsed
}

fn parse_enum<T: FromStr<Err = Error>>(value: Option<String>, default: T) -> Result<T> {
    value.map_or(Ok(default), |v| v.parse())
}

impl Config {
    /// Load configuration from the config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a provider or backend name is not recognized
    pub fn load() -> Result<Self> {
        let fc = file::config_file_path()
            .map(|path| file::load_config_file(&path))
            .unwrap_or_default();

        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment values
    ///
    /// `env` looks up a variable by name; tests pass a map instead of the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a provider or backend name is not recognized
    pub fn resolve(fc: VoxqueryConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_nonempty = |key: &str| env(key).filter(|s| !s.trim().is_empty());

        // Server (env > toml > default)
        let server = ServerConfig {
            host: env("VOXQUERY_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env_parse(&env, "VOXQUERY_PORT")
                .or_else(|| env_parse(&env, "PORT"))
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let audio = AudioConfig {
            max_bytes: env_parse(&env, "VOXQUERY_MAX_AUDIO_BYTES")
                .or(fc.audio.max_bytes)
                .unwrap_or(DEFAULT_MAX_AUDIO_BYTES),
            min_duration: Duration::from_millis(fc.audio.min_duration_ms.unwrap_or(100)),
            silence_threshold: fc.audio.silence_threshold.unwrap_or(0.001),
            sample_rate: fc
                .audio
                .sample_rate
                .unwrap_or_else(|| TargetFormat::default().sample_rate),
            allow_silent: env_bool(&env, "VOXQUERY_ALLOW_SILENT")
                .or(fc.audio.allow_silent)
                .unwrap_or(false),
        };

        let cache = CacheConfig {
            backend: parse_enum(
                env("VOXQUERY_CACHE_BACKEND").or(fc.cache.backend),
                CacheBackend::default(),
            )?,
            path: env("VOXQUERY_CACHE_PATH")
                .or(fc.cache.path)
                .map_or_else(default_cache_path, PathBuf::from),
            ttl: env_parse(&env, "VOXQUERY_CACHE_TTL_SECS")
                .or(fc.cache.ttl_secs)
                .map_or(DEFAULT_TTL, Duration::from_secs),
            capacity: fc.cache.capacity.unwrap_or(1024),
        };

        // API keys (env > toml > None)
        let key = |env_key: &str, file_value: Option<String>| {
            env_nonempty(env_key)
                .or(file_value.filter(|s| !s.trim().is_empty()))
                .map(SecretString::from)
        };

        let search = SearchConfig {
            endpoint: env("VOXQUERY_SEARCH_ENDPOINT")
                .or(fc.search.endpoint)
                .unwrap_or_else(|| crate::search::SERPAPI_ENDPOINT.to_string()),
            api_key: key("SERPAPI_API_KEY", fc.api_keys.serpapi),
            engine: fc.search.engine.unwrap_or_else(|| "google".to_string()),
            language: env("VOXQUERY_SEARCH_LANGUAGE").or(fc.search.language),
            country: env("VOXQUERY_SEARCH_COUNTRY").or(fc.search.country),
            timeout: fc
                .search
                .timeout_secs
                .map_or(crate::search::DEFAULT_TIMEOUT, Duration::from_secs),
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: env_parse(&env, "VOXQUERY_RETRY_MAX_ATTEMPTS")
                .or(fc.retry.max_attempts)
                .unwrap_or(defaults.max_attempts),
            base_delay: fc
                .retry
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            max_delay: fc
                .retry
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            jitter: fc.retry.jitter.unwrap_or(defaults.jitter),
        };

        let voice = VoiceConfig {
            language: env("VOXQUERY_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or_else(|| "pt-BR".to_string()),
            stt_provider: parse_enum(
                env("VOXQUERY_STT_PROVIDER").or(fc.voice.stt_provider),
                SttProvider::default(),
            )?,
            stt_model: env("VOXQUERY_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            stt_endpoint: fc.voice.stt_endpoint,
            tts_provider: parse_enum(
                env("VOXQUERY_TTS_PROVIDER").or(fc.voice.tts_provider),
                TtsProvider::default(),
            )?,
            tts_model: env("VOXQUERY_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env("VOXQUERY_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            tts_endpoint: fc.voice.tts_endpoint,
            response_template: fc.voice.response_template,
            openai_api_key: key("OPENAI_API_KEY", fc.api_keys.openai),
            deepgram_api_key: key("DEEPGRAM_API_KEY", fc.api_keys.deepgram),
            elevenlabs_api_key: key("ELEVENLABS_API_KEY", fc.api_keys.elevenlabs),
        };

        if audio.max_bytes == 0 {
            return Err(Error::Config("audio.max_bytes must be greater than zero".to_string()));
        }
        if audio.sample_rate == 0 {
            return Err(Error::Config(
                "audio.sample_rate must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server,
            audio,
            intent_commands: fc.intent.commands,
            cache,
            search,
            retry,
            voice,
        })
    }
}

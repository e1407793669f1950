//! Speech-to-text (STT) adapters

use std::str::FromStr;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::Transcriber;
use crate::audio::AudioBlob;
use crate::config::VoiceConfig;
use crate::{Error, Result};

const WHISPER_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_ENDPOINT: &str = "https://api.deepgram.com/v1/listen";

/// Response from OpenAI Whisper transcription API
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    #[default]
    Whisper,
    Deepgram,
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Transcribes speech through a hosted API
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    language: Option<String>,
    endpoint: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(SttProvider::Whisper, api_key, model)
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: SecretString, model: String) -> Result<Self> {
        Self::new(SttProvider::Deepgram, api_key, model)
    }

    fn new(provider: SttProvider, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            let name = match provider {
                SttProvider::Whisper => "OpenAI API key required for Whisper",
                SttProvider::Deepgram => "Deepgram API key required",
            };
            return Err(Error::Config(name.to_string()));
        }

        let endpoint = match provider {
            SttProvider::Whisper => WHISPER_ENDPOINT,
            SttProvider::Deepgram => DEEPGRAM_ENDPOINT,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language: None,
            endpoint: endpoint.to_string(),
            provider,
        })
    }

    /// Build the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is not configured
    pub fn from_config(config: &VoiceConfig) -> Result<Self> {
        let key = match config.stt_provider {
            SttProvider::Whisper => config.openai_api_key.clone(),
            SttProvider::Deepgram => config.deepgram_api_key.clone(),
        };
        let key = key.unwrap_or_else(|| SecretString::new(String::new().into()));

        let mut stt = Self::new(config.stt_provider, key, config.stt_model.clone())?
            .with_language(&config.language);
        if let Some(endpoint) = &config.stt_endpoint {
            stt = stt.with_endpoint(endpoint);
        }
        Ok(stt)
    }

    /// Spoken language hint (BCP 47, e.g. `pt-BR`)
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string()).filter(|l| !l.is_empty());
        self
    }

    /// Override the API endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &AudioBlob) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let file_name = format!(
            "audio.{}",
            audio.format().map_or("wav", |f| f.extension())
        );
        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.data().to_vec())
                    .file_name(file_name)
                    .mime_str(audio.mime_type())
                    .map_err(|e| Error::TranscriptionFailed(e.to_string()))?,
            )
            .text("model", self.model.clone());

        // Whisper takes ISO-639-1, so `pt-BR` becomes `pt`
        if let Some(lang) = self.language.as_deref().and_then(|l| l.split('-').next()) {
            form = form.text("language", lang.to_ascii_lowercase());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::TranscriptionFailed(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::TranscriptionFailed(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::TranscriptionFailed(e.to_string())
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &AudioBlob) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let mut query = vec![("model", self.model.as_str()), ("punctuate", "true")];
        if let Some(lang) = &self.language {
            query.push(("language", lang.as_str()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .query(&query)
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", audio.mime_type())
            .body(audio.data().to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                Error::TranscriptionFailed(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::TranscriptionFailed(format!(
                "Deepgram API error {status}: {body}"
            )));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            Error::TranscriptionFailed(e.to_string())
        })?;

        let transcript = result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &AudioBlob) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await,
        }
    }

    fn name(&self) -> &'static str {
        match self.provider {
            SttProvider::Whisper => "whisper",
            SttProvider::Deepgram => "deepgram",
        }
    }
}

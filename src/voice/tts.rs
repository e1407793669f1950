//! Text-to-speech (TTS) adapters

use std::str::FromStr;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::Synthesizer;
use crate::config::VoiceConfig;
use crate::{Error, Result};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_ENDPOINT: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// TTS provider backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes speech through a hosted API
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    endpoint: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: SecretString, voice: String, speed: f32) -> Result<Self> {
        Self::new_openai_with_model(api_key, voice, speed, "tts-1".to_string())
    }

    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai_with_model(
        api_key: SecretString,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            endpoint: OPENAI_ENDPOINT.to_string(),
            provider: TtsProvider::OpenAi,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: SecretString, voice_id: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            speed: 1.0,
            model,
            endpoint: ELEVENLABS_ENDPOINT.to_string(),
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Build the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is not configured
    pub fn from_config(config: &VoiceConfig) -> Result<Self> {
        let empty = || SecretString::new(String::new().into());

        let mut tts = match config.tts_provider {
            TtsProvider::OpenAi => Self::new_openai_with_model(
                config.openai_api_key.clone().unwrap_or_else(empty),
                config.tts_voice.clone(),
                config.tts_speed,
                config.tts_model.clone(),
            )?,
            TtsProvider::ElevenLabs => Self::new_elevenlabs(
                config.elevenlabs_api_key.clone().unwrap_or_else(empty),
                config.tts_voice.clone(),
                config.tts_model.clone(),
            )?,
        };

        if let Some(endpoint) = &config.tts_endpoint {
            tts = tts.with_endpoint(endpoint);
        }
        Ok(tts)
    }

    /// Override the API endpoint (for ElevenLabs, the base before `/{voice}`)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::SynthesisFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SynthesisFailed(format!(
                "OpenAI TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::SynthesisFailed(e.to_string()))?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/{}", self.endpoint, self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::SynthesisFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SynthesisFailed(format!(
                "ElevenLabs TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::SynthesisFailed(e.to_string()))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::SynthesisFailed("nothing to synthesize".to_string()));
        }

        let audio = match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text).await?,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await?,
        };

        if audio.is_empty() {
            return Err(Error::SynthesisFailed("provider returned no audio".to_string()));
        }

        tracing::debug!(chars = text.len(), audio_bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        match self.provider {
            TtsProvider::OpenAi => "openai",
            TtsProvider::ElevenLabs => "elevenlabs",
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn key() -> SecretString {
        SecretString::new("test-key".into())
    }

    #[tokio::test]
    async fn openai_synthesizes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(body_partial_json(serde_json::json!({"voice": "alloy", "input": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90]))
            .expect(1)
            .mount(&server)
            .await;

        let tts = TextToSpeech::new_openai(key(), "alloy".into(), 1.0)
            .unwrap()
            .with_endpoint(&format!("{}/v1/audio/speech", server.uri()));

        assert_eq!(tts.synthesize("hello").await.unwrap(), vec![0xFF, 0xFB, 0x90]);
    }

    #[tokio::test]
    async fn elevenlabs_uses_voice_path() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-123"))
            .and(header("xi-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let tts = TextToSpeech::new_elevenlabs(key(), "voice-123".into(), "eleven_multilingual_v2".into())
            .unwrap()
            .with_endpoint(&format!("{}/v1/text-to-speech/", server.uri()));

        assert_eq!(tts.synthesize("olá").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_text_rejected_without_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1]))
            .expect(0)
            .mount(&server)
            .await;

        let tts = TextToSpeech::new_openai(key(), "alloy".into(), 1.0)
            .unwrap()
            .with_endpoint(&server.uri());

        let err = tts.synthesize("   ").await.unwrap_err();
        assert!(matches!(err, Error::SynthesisFailed(_)));
    }

    #[tokio::test]
    async fn api_error_is_synthesis_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let tts = TextToSpeech::new_openai(key(), "alloy".into(), 1.0)
            .unwrap()
            .with_endpoint(&server.uri());

        assert!(matches!(
            tts.synthesize("hello").await,
            Err(Error::SynthesisFailed(_))
        ));
    }
}

//! End-to-end voice query processing
//!
//! One call to [`Pipeline::process`] handles one request:
//! validate, normalize if needed, transcribe, extract intent, resolve,
//! synthesize. The audio blob is moved in and dropped as soon as
//! transcription is done.

use std::sync::Arc;

use serde::Serialize;

use crate::audio::{AudioBlob, AudioValidator, FormatNormalizer, ValidationVerdict};
use crate::intent::{IntentExtractor, IntentSource};
use crate::search::{
    Resolution, ResultSource, SearchQuery, SearchResolver, SearchResults, SerpApiClient,
};
use crate::voice::{SpeechToText, Synthesizer, TextToSpeech, Transcriber};
use crate::{Config, Error, Result, cache};

/// Message returned when a query legitimately has no results
pub const NO_RESULTS_MESSAGE: &str = "No relevant results found.";

/// Per-deployment behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Transcribe audio the validator flagged as silent instead of rejecting it
    pub allow_silent: bool,
    /// Spoken response text; `{query}` and `{count}` are substituted
    pub response_template: Option<String>,
}

/// What the pipeline produced for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Results found, with a spoken summary
    Results {
        results: SearchResults,
        source: ResultSource,
        speech: String,
        audio: Vec<u8>,
        audio_mime: &'static str,
    },
    /// The provider had nothing for this query
    NoResults { message: String },
}

/// Full result of processing one voice query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub transcript: String,
    pub query: SearchQuery,
    pub query_source: IntentSource,
    pub answer: Answer,
}

/// Result of validation and conversion, for reporting without transcription
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedAudio {
    pub verdict: &'static str,
    pub converted: bool,
    pub mime_type: String,
    pub bytes: usize,
}

/// Wires validator, normalizer, speech engines, intent extraction and search
pub struct Pipeline {
    validator: AudioValidator,
    normalizer: FormatNormalizer,
    intents: IntentExtractor,
    resolver: SearchResolver,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Create a pipeline with default validation and intent rules
    #[must_use]
    pub fn new(
        resolver: SearchResolver,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            validator: AudioValidator::default(),
            normalizer: FormatNormalizer,
            intents: IntentExtractor::default(),
            resolver,
            transcriber,
            synthesizer,
            options: PipelineOptions::default(),
        }
    }

    /// Build every component from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the cache cannot be opened, an API key is missing,
    /// or the intent commands are invalid
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = cache::open(&config.cache)?;
        let client = SerpApiClient::from_config(&config.search)?;
        let resolver = SearchResolver::new(cache, Arc::new(client))
            .with_retry(config.retry.clone())
            .with_ttl(config.cache.ttl);

        let intents = match &config.intent_commands {
            Some(commands) => IntentExtractor::with_commands(commands.as_slice())?,
            None => IntentExtractor::default(),
        };

        let stt = SpeechToText::from_config(&config.voice)?;
        let tts = TextToSpeech::from_config(&config.voice)?;

        tracing::info!(
            stt = stt.name(),
            tts = tts.name(),
            cache = resolver.cache().backend(),
            "pipeline configured"
        );

        Ok(Self::new(resolver, Arc::new(stt), Arc::new(tts))
            .with_validator(config.audio.validator())
            .with_intents(intents)
            .with_options(PipelineOptions {
                allow_silent: config.audio.allow_silent,
                response_template: config.voice.response_template.clone(),
            }))
    }

    /// Replace the validator
    #[must_use]
    pub fn with_validator(mut self, validator: AudioValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the intent extractor
    #[must_use]
    pub fn with_intents(mut self, intents: IntentExtractor) -> Self {
        self.intents = intents;
        self
    }

    /// Replace the behaviour switches
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolver in use
    #[must_use]
    pub const fn resolver(&self) -> &SearchResolver {
        &self.resolver
    }

    /// Validator in use
    #[must_use]
    pub const fn validator(&self) -> &AudioValidator {
        &self.validator
    }

    /// Process one voice query
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the audio is rejected (before any
    ///   transcription or network call)
    /// - [`Error::Conversion`] if normalization fails
    /// - [`Error::TranscriptionFailed`] if speech-to-text fails
    /// - [`Error::EmptyIntent`] if the transcript has no usable query
    /// - [`Error::UpstreamUnavailable`] if the search provider keeps failing
    /// - [`Error::SynthesisFailed`] if the spoken response cannot be produced
    pub async fn process(&self, blob: AudioBlob) -> Result<PipelineOutcome> {
        let (audio, _) = self.prepare(blob).await?;

        let transcript = self
            .transcriber
            .transcribe(&audio)
            .await
            .map_err(|e| match e {
                Error::TranscriptionFailed(_) => e,
                other => Error::TranscriptionFailed(other.to_string()),
            })?;
        drop(audio);

        tracing::info!(
            engine = self.transcriber.name(),
            chars = transcript.chars().count(),
            "audio transcribed"
        );
        tracing::debug!(transcript = %transcript, "transcript text");

        let intent = self
            .intents
            .extract_intent(&transcript)
            .ok_or(Error::EmptyIntent)?;

        tracing::info!(
            query = %intent.query,
            source = ?intent.source,
            "search intent extracted"
        );

        let answer = match self.resolver.resolve(intent.query.as_str()).await? {
            Resolution::Found { results, source } => {
                let speech = self.response_text(&intent.query, results.len());
                let audio = self.synthesizer.synthesize(&speech).await?;
                Answer::Results {
                    results,
                    source,
                    speech,
                    audio,
                    audio_mime: self.synthesizer.mime_type(),
                }
            }
            Resolution::NotFound => Answer::NoResults {
                message: NO_RESULTS_MESSAGE.to_string(),
            },
        };

        Ok(PipelineOutcome {
            transcript,
            query: intent.query,
            query_source: intent.source,
            answer,
        })
    }

    /// Validate and, if needed, convert a blob without transcribing it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] or [`Error::Conversion`]
    pub async fn check(&self, blob: AudioBlob) -> Result<PreparedAudio> {
        let (_, report) = self.prepare(blob).await?;
        Ok(report)
    }

    /// Run validation and conversion off the async runtime
    async fn prepare(&self, blob: AudioBlob) -> Result<(AudioBlob, PreparedAudio)> {
        let validator = self.validator.clone();
        let normalizer = self.normalizer;
        let allow_silent = self.options.allow_silent;

        tokio::task::spawn_blocking(move || {
            prepare_blocking(&validator, normalizer, blob, allow_silent)
        })
        .await
        .map_err(|e| Error::Audio(format!("audio preparation task failed: {e}")))?
    }

    fn response_text(&self, query: &SearchQuery, count: usize) -> String {
        match &self.options.response_template {
            Some(template) => template
                .replace("{query}", query.as_str())
                .replace("{count}", &count.to_string()),
            None => {
                let noun = if count == 1 { "result" } else { "results" };
                format!("Your search for {query} returned {count} {noun}.")
            }
        }
    }
}

fn prepare_blocking(
    validator: &AudioValidator,
    normalizer: FormatNormalizer,
    blob: AudioBlob,
    allow_silent: bool,
) -> Result<(AudioBlob, PreparedAudio)> {
    let verdict = validator.validate(&blob);
    let label = verdict.label();

    let target = match verdict {
        ValidationVerdict::Invalid { reason } => return Err(Error::Validation(reason)),
        ValidationVerdict::Warning { reason, .. } if !allow_silent => {
            return Err(Error::Validation(reason));
        }
        ValidationVerdict::Warning { target, .. } => target,
        ValidationVerdict::ValidNeedsConversion { target, .. } => Some(target),
        ValidationVerdict::Valid { .. } => None,
    };

    let audio = match target {
        Some(target) => normalizer.convert(&blob, target)?,
        None => blob,
    };

    let report = PreparedAudio {
        verdict: label,
        converted: target.is_some(),
        mime_type: audio.mime_type().to_string(),
        bytes: audio.len(),
    };
    Ok((audio, report))
}

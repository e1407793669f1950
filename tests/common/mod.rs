//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use voxquery::audio::AudioBlob;
use voxquery::cache::MemoryCache;
use voxquery::search::{FetchError, RetryPolicy};
use voxquery::{
    Pipeline, ResultCache, SearchClient, SearchHit, SearchQuery, SearchResolver, SearchResults,
    Synthesizer, Transcriber,
};

/// Encode `seconds` of a 440 Hz tone as 16 kHz mono 16-bit WAV
#[must_use]
pub fn tone_wav(seconds: u32) -> Vec<u8> {
    let sample_rate = 16_000;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for i in 0..sample_rate * seconds {
            let t = f64::from(i) / f64::from(sample_rate);
            let sample = (2.0 * std::f64::consts::PI * 440.0 * t).sin() * 0.5;
            #[allow(clippy::cast_possible_truncation)]
            writer
                .write_sample((sample * f64::from(i16::MAX)) as i16)
                .expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// `n` distinct hits
#[must_use]
pub fn hits(n: usize) -> SearchResults {
    SearchResults::from_hits((0..n).map(|i| SearchHit {
        title: format!("Result {i}"),
        snippet: format!("Snippet {i}"),
        url: format!("https://example.com/{i}"),
    }))
}

/// Transcriber returning a fixed transcript
pub struct FakeTranscriber {
    pub transcript: String,
    pub calls: AtomicU32,
}

impl FakeTranscriber {
    pub fn new(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &AudioBlob) -> voxquery::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Synthesizer returning the text bytes as "audio"
pub struct FakeSynthesizer {
    pub calls: AtomicU32,
}

impl FakeSynthesizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> voxquery::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("ID3{text}").into_bytes())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Search client answering every query with the same outcome
pub struct ScriptedSearchClient {
    pub outcome: Result<SearchResults, FetchError>,
    pub calls: AtomicU32,
}

impl ScriptedSearchClient {
    pub fn returning(results: SearchResults) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(results),
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing(error: FetchError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchClient for ScriptedSearchClient {
    async fn fetch(&self, _query: &SearchQuery) -> Result<SearchResults, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Pipeline over fakes, with an in-memory cache and no retry delay
pub struct TestPipeline {
    pub pipeline: Pipeline,
    pub cache: Arc<dyn ResultCache>,
    pub stt: Arc<FakeTranscriber>,
    pub tts: Arc<FakeSynthesizer>,
    pub search: Arc<ScriptedSearchClient>,
}

pub fn test_pipeline(transcript: &str, search: Arc<ScriptedSearchClient>) -> TestPipeline {
    let cache: Arc<dyn ResultCache> = Arc::new(MemoryCache::default());
    let stt = FakeTranscriber::new(transcript);
    let tts = FakeSynthesizer::new();

    let resolver = SearchResolver::new(cache.clone(), search.clone()).with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(2),
        jitter: false,
    });
    let pipeline = Pipeline::new(resolver, stt.clone(), tts.clone());

    TestPipeline {
        pipeline,
        cache,
        stt,
        tts,
        search,
    }
}

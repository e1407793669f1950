//! End-to-end pipeline tests over fake speech engines

use voxquery::audio::{AudioBlob, InvalidReason};
use voxquery::search::FetchError;
use voxquery::{Answer, Error, IntentSource, ResultSource, SearchQuery};

mod common;
use common::{ScriptedSearchClient, hits, test_pipeline, tone_wav};

#[tokio::test]
async fn test_spoken_query_is_answered_and_cached() {
    let t = test_pipeline("busque receitas veganas", ScriptedSearchClient::returning(hits(3)));

    let outcome = t
        .pipeline
        .process(AudioBlob::new(tone_wav(5), "audio/wav"))
        .await
        .unwrap();

    assert_eq!(outcome.transcript, "busque receitas veganas");
    assert_eq!(outcome.query.as_str(), "receitas veganas");
    assert_eq!(outcome.query_source, IntentSource::Command);

    let Answer::Results {
        results,
        source,
        speech,
        audio,
        ..
    } = outcome.answer
    else {
        panic!("expected results");
    };
    assert_eq!(results.len(), 3);
    assert_eq!(source, ResultSource::Upstream);
    assert!(speech.contains("receitas veganas"));
    assert!(!audio.is_empty());

    assert_eq!(t.stt.calls(), 1);
    assert_eq!(t.search.calls(), 1);
    assert_eq!(t.tts.calls(), 1);

    let cached = t
        .cache
        .get(&SearchQuery::new("receitas veganas").unwrap())
        .await
        .unwrap();
    assert_eq!(cached, Some(hits(3)));
}

#[tokio::test]
async fn test_repeat_query_is_served_from_cache() {
    let t = test_pipeline("search for rust", ScriptedSearchClient::returning(hits(2)));

    t.pipeline
        .process(AudioBlob::new(tone_wav(1), "audio/wav"))
        .await
        .unwrap();
    let second = t
        .pipeline
        .process(AudioBlob::new(tone_wav(1), "audio/wav"))
        .await
        .unwrap();

    assert!(matches!(
        second.answer,
        Answer::Results {
            source: ResultSource::Cache,
            ..
        }
    ));
    assert_eq!(t.search.calls(), 1);
}

#[tokio::test]
async fn test_oversized_audio_rejected_before_any_call() {
    let t = test_pipeline("search for cats", ScriptedSearchClient::returning(hits(1)));

    let blob = AudioBlob::new(vec![0u8; 15 * 1024 * 1024], "audio/wav");
    let err = t.pipeline.process(blob).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(InvalidReason::TooLarge { .. })
    ));
    assert_eq!(t.stt.calls(), 0);
    assert_eq!(t.search.calls(), 0);
    assert_eq!(t.tts.calls(), 0);
}

#[tokio::test]
async fn test_unsupported_mime_rejected() {
    let t = test_pipeline("search for cats", ScriptedSearchClient::returning(hits(1)));

    let err = t
        .pipeline
        .process(AudioBlob::new(tone_wav(1), "text/plain"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(InvalidReason::UnsupportedMime(_))
    ));
    assert_eq!(t.stt.calls(), 0);
}

#[tokio::test]
async fn test_empty_results_are_not_cached() {
    let t = test_pipeline("search for nothing at all", ScriptedSearchClient::returning(hits(0)));

    let outcome = t
        .pipeline
        .process(AudioBlob::new(tone_wav(1), "audio/wav"))
        .await
        .unwrap();

    assert!(matches!(outcome.answer, Answer::NoResults { .. }));
    assert_eq!(t.tts.calls(), 0);
    assert_eq!(
        t.cache
            .get(&SearchQuery::new("nothing at all").unwrap())
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_upstream_failure_is_distinct_from_no_results() {
    let t = test_pipeline(
        "search for cats",
        ScriptedSearchClient::failing(FetchError::Status {
            status: 503,
            body: "busy".to_string(),
        }),
    );

    let err = t
        .pipeline
        .process(AudioBlob::new(tone_wav(1), "audio/wav"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable(_)));
    assert_eq!(t.search.calls(), 3);
    assert_eq!(
        t.cache.get(&SearchQuery::new("cats").unwrap()).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_blank_transcript_is_empty_intent() {
    let t = test_pipeline("   ", ScriptedSearchClient::returning(hits(1)));

    let err = t
        .pipeline
        .process(AudioBlob::new(tone_wav(1), "audio/wav"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyIntent));
    assert_eq!(t.search.calls(), 0);
}

#[tokio::test]
async fn test_transcript_without_command_passes_through() {
    let t = test_pipeline("Hello there", ScriptedSearchClient::returning(hits(1)));

    let outcome = t
        .pipeline
        .process(AudioBlob::new(tone_wav(1), "audio/wav"))
        .await
        .unwrap();

    assert_eq!(outcome.query.as_str(), "hello there");
    assert_eq!(outcome.query_source, IntentSource::Fallback);
}

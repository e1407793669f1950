//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine;
use tower::ServiceExt;
use voxquery::api::{self, ApiState};

mod common;
use common::{ScriptedSearchClient, TestPipeline, hits, test_pipeline, tone_wav};

const BOUNDARY: &str = "voxquery-test-boundary";

/// Build a test API router over fake engines
fn build_test_router(t: TestPipeline) -> axum::Router {
    api::router(ApiState::new(Arc::new(t.pipeline)))
}

/// Encode one file field as multipart/form-data
fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process-audio")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_router(test_pipeline("", ScriptedSearchClient::returning(hits(1))));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_checks_cache() {
    let app = build_test_router(test_pipeline("", ScriptedSearchClient::returning(hits(1))));

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["checks"]["cache"]["status"], "ok");
}

#[tokio::test]
async fn test_process_audio_returns_results_and_speech() {
    let app = build_test_router(test_pipeline(
        "busque receitas veganas",
        ScriptedSearchClient::returning(hits(3)),
    ));

    let body = multipart_body("audio", "query.wav", "audio/wav", &tone_wav(2));
    let response = app.oneshot(upload(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["transcript"], "busque receitas veganas");
    assert_eq!(json["query"], "receitas veganas");
    assert_eq!(json["query_source"], "command");
    assert_eq!(json["source"], "upstream");
    assert_eq!(json["results"].as_array().unwrap().len(), 3);
    assert_eq!(json["results"][0]["title"], "Result 0");
    assert_eq!(json["audio_mime"], "audio/mpeg");

    let audio = base64::engine::general_purpose::STANDARD
        .decode(json["audio_base64"].as_str().unwrap())
        .unwrap();
    assert!(!audio.is_empty());
}

#[tokio::test]
async fn test_process_audio_without_results_is_not_found() {
    let app = build_test_router(test_pipeline(
        "search for zzzz",
        ScriptedSearchClient::returning(hits(0)),
    ));

    let body = multipart_body("audio", "query.wav", "audio/wav", &tone_wav(1));
    let response = app.oneshot(upload(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["message"], voxquery::pipeline::NO_RESULTS_MESSAGE);
}

#[tokio::test]
async fn test_missing_audio_field_is_bad_request() {
    let app = build_test_router(test_pipeline("", ScriptedSearchClient::returning(hits(1))));

    let body = multipart_body("file", "query.wav", "audio/wav", &tone_wav(1));
    let response = app.oneshot(upload(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "missing_audio");
    assert_eq!(json["error"]["message"], "no audio uploaded");
}

#[tokio::test]
async fn test_invalid_audio_is_bad_request() {
    let app = build_test_router(test_pipeline(
        "search for cats",
        ScriptedSearchClient::returning(hits(1)),
    ));

    let body = multipart_body("audio", "notes.txt", "text/plain", b"not audio");
    let response = app.oneshot(upload(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "invalid_audio");
}

#[tokio::test]
async fn test_upstream_failure_is_service_unavailable() {
    let app = build_test_router(test_pipeline(
        "search for cats",
        ScriptedSearchClient::failing(voxquery::search::FetchError::Timeout),
    ));

    let body = multipart_body("audio", "query.wav", "audio/wav", &tone_wav(1));
    let response = app.oneshot(upload(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "upstream_unavailable");
    assert!(json["error"]["message"].as_str().unwrap().contains("try again later"));
}

#[tokio::test]
async fn test_clear_cache_endpoint() {
    let t = test_pipeline("search for cats", ScriptedSearchClient::returning(hits(1)));
    let cache = t.cache.clone();
    cache
        .put(
            &voxquery::SearchQuery::new("cats").unwrap(),
            &hits(1),
            std::time::Duration::from_secs(60),
        )
        .await
        .unwrap();
    let app = build_test_router(t);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["cleared"], true);
    assert_eq!(
        cache
            .get(&voxquery::SearchQuery::new("cats").unwrap())
            .await
            .unwrap(),
        None
    );
}

//! Voice query endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use base64::Engine;
use serde::Serialize;
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::audio::{AudioBlob, AudioFormat};
use crate::intent::IntentSource;
use crate::pipeline::Answer;
use crate::search::{ResultSource, SearchHit, SearchQuery};

/// Multipart field carrying the recording
const AUDIO_FIELD: &str = "audio";

/// Build the voice query router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/process-audio", post(process_audio))
        .with_state(state)
}

/// Answer to a voice query
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub transcript: String,
    pub query: SearchQuery,
    pub query_source: IntentSource,
    pub results: Vec<SearchHit>,
    pub source: ResultSource,
    /// Spoken summary, also returned as audio
    pub message: String,
    pub audio_base64: String,
    pub audio_mime: &'static str,
}

/// Returned with 404 when the provider had nothing for the query
#[derive(Debug, Serialize)]
pub struct NoResultsResponse {
    pub message: String,
    pub transcript: String,
    pub query: SearchQuery,
}

/// Accept an uploaded recording and answer it
async fn process_audio(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let blob = read_audio_field(multipart).await?;

    tracing::info!(
        %request_id,
        bytes = blob.len(),
        mime = blob.mime_type(),
        "voice query received"
    );

    let outcome = state.pipeline.process(blob).await?;

    let response = match outcome.answer {
        Answer::Results {
            results,
            source,
            speech,
            audio,
            audio_mime,
        } => {
            tracing::info!(
                %request_id,
                query = %outcome.query,
                count = results.len(),
                source = ?source,
                "voice query answered"
            );
            Json(ProcessResponse {
                transcript: outcome.transcript,
                query: outcome.query,
                query_source: outcome.query_source,
                results: results.into(),
                source,
                message: speech,
                audio_base64: base64::engine::general_purpose::STANDARD.encode(audio),
                audio_mime,
            })
            .into_response()
        }
        Answer::NoResults { message } => {
            tracing::info!(%request_id, query = %outcome.query, "no results for voice query");
            (
                StatusCode::NOT_FOUND,
                Json(NoResultsResponse {
                    message,
                    transcript: outcome.transcript,
                    query: outcome.query,
                }),
            )
                .into_response()
        }
    };

    Ok(response)
}

/// Pull the `audio` field out of the form, skipping anything else
async fn read_audio_field(mut multipart: Multipart) -> Result<AudioBlob, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let mime_type = field_mime_type(field.content_type(), field.file_name());
        let data = field.bytes().await?;
        return Ok(AudioBlob::new(data.to_vec(), mime_type));
    }

    Err(ApiError::MissingAudio)
}

/// Declared content type, or a guess from the file name
///
/// `application/octet-stream` counts as undeclared.
fn field_mime_type(content_type: Option<&str>, file_name: Option<&str>) -> String {
    let declared = content_type
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream");

    if let Some(ct) = declared {
        return ct.to_string();
    }

    file_name
        .and_then(|name| name.rsplit_once('.'))
        .and_then(|(_, ext)| AudioFormat::from_extension(ext))
        .map_or_else(
            || content_type.unwrap_or("application/octet-stream").to_string(),
            |format| format.mime_type().to_string(),
        )
}

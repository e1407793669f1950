//! Error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::Error;

/// API errors, rendered as `{"error": {"code", "message"}}`
#[derive(Debug)]
pub enum ApiError {
    /// Request had no `audio` field
    MissingAudio,
    /// Multipart body could not be read
    Multipart { status: StatusCode, message: String },
    /// The pipeline failed
    Pipeline(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Pipeline(e)
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self::Multipart {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

fn pipeline_status(e: &Error) -> StatusCode {
    match e {
        Error::Validation(_) | Error::EmptyIntent | Error::EmptyQuery => StatusCode::BAD_REQUEST,
        Error::TranscriptionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::UpstreamUnavailable(_) | Error::CacheUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn pipeline_message(e: &Error) -> String {
    match e {
        Error::Validation(reason) => reason.to_string(),
        Error::TranscriptionFailed(_) => {
            "could not transcribe the audio, try a clearer recording".to_string()
        }
        Error::Conversion(_) => "could not convert the audio to a supported format".to_string(),
        Error::EmptyIntent => "no search request was recognized in the audio".to_string(),
        Error::EmptyQuery => "the search query is empty".to_string(),
        Error::UpstreamUnavailable(_) | Error::CacheUnavailable(_) => {
            "search is temporarily unavailable, try again later".to_string()
        }
        _ => "an error occurred while processing the audio, try again later".to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::MissingAudio => (
                StatusCode::BAD_REQUEST,
                "missing_audio",
                "no audio uploaded".to_string(),
            ),
            Self::Multipart { status, message } => (status, "bad_request", message),
            Self::Pipeline(e) => {
                let status = pipeline_status(&e);
                if status.is_server_error() {
                    tracing::error!(error = %e, code = e.code(), "request failed");
                } else {
                    tracing::info!(error = %e, code = e.code(), "request rejected");
                }
                (status, e.code(), pipeline_message(&e))
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

//! Health check and cache maintenance endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};
use serde::Serialize;

use super::{ApiError, ApiState};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub cache: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }
}

/// Response for cache maintenance calls
#[derive(Serialize)]
pub struct CacheClearedResponse {
    pub cleared: bool,
    pub backend: &'static str,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can the cache round-trip an entry?
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let cache_check = check_cache(&state).await;
    let all_ok = cache_check.status == "ok";

    let status = if all_ok { "ok" } else { "degraded" };
    let http_status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks { cache: cache_check },
        }),
    )
}

async fn check_cache(state: &ApiState) -> CheckResult {
    if state.cache.health_check().await {
        CheckResult::ok()
    } else {
        CheckResult::fail(format!("{} cache probe failed", state.cache.backend()))
    }
}

/// Drop every cached result set
async fn clear_cache(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CacheClearedResponse>, ApiError> {
    state.cache.clear().await?;
    tracing::info!(backend = state.cache.backend(), "result cache cleared");

    Ok(Json(CacheClearedResponse {
        cleared: true,
        backend: state.cache.backend(),
    }))
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .route("/cache", delete(clear_cache))
        .with_state(state)
}

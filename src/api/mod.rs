//! HTTP API server

mod error;
pub mod health;
pub mod process;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::Result;
use crate::cache::ResultCache;
use crate::pipeline::Pipeline;

/// Multipart framing allowance on top of the audio limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
    pub cache: Arc<dyn ResultCache>,
}

impl ApiState {
    /// Create state around a pipeline; the cache is the resolver's
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let cache = Arc::clone(pipeline.resolver().cache());
        Self { pipeline, cache }
    }
}

/// Build the router with all routes
///
/// The body limit is twice the audio limit so oversized uploads still reach
/// the validator and get its size message instead of a bare 413.
pub fn router(state: ApiState) -> Router {
    let state = Arc::new(state);
    let body_limit = state
        .pipeline
        .validator()
        .config()
        .max_bytes
        .saturating_mul(2)
        .saturating_add(MULTIPART_OVERHEAD);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(process::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// HTTP API server
pub struct ApiServer {
    state: ApiState,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Create a server bound to `host:port` on [`ApiServer::run`]
    #[must_use]
    pub fn new(state: ApiState, host: impl Into<String>, port: u16) -> Self {
        Self {
            state,
            host: host.into(),
            port,
        }
    }

    /// Run the API server until ctrl-c
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, cache = self.state.cache.backend(), "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            })
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}

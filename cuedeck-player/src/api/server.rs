//! HTTP server setup and routing
//!
//! Axum control surface over the orchestrator: cue triggering, stop, state
//! snapshot, notices, speech quota, the streaming authorization callback and
//! the SSE event stream.

use crate::backend::BackendSet;
use crate::error::{Error, Result};
use crate::playback::OrchestratorHandle;
use crate::speech::GenerationQuota;
use crate::store::CueStore;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub orchestrator: OrchestratorHandle,
    pub store: Arc<dyn CueStore>,
    pub backends: BackendSet,
    /// Cloud speech quota, absent when no cloud provider is configured
    pub quota: Option<Arc<GenerationQuota>>,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Cue library
        .route("/cues", get(super::handlers::list_cues))
        .route("/cues/:cue_id/trigger", post(super::handlers::trigger_cue))
        .route("/cues/:cue_id/preview", post(super::handlers::preview_cue))

        // Playback control
        .route("/playback/stop", post(super::handlers::stop))
        .route("/playback/state", get(super::handlers::get_state))
        .route("/playback/notice/dismiss", post(super::handlers::dismiss_notice))
        .route("/playback/diagnostics", get(super::handlers::get_diagnostics))

        // Speech
        .route("/speech/quota", get(super::handlers::get_speech_quota))

        // Streaming service authorization redirect
        .route("/streaming/callback", get(super::handlers::streaming_callback))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run(port: u16, ctx: AppContext, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}

//! HTTP request handlers

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::{Diagnostics, StopOutcome, TriggerOutcome};
use crate::speech::QuotaStatus;
use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    Json,
};
use cuedeck_common::{SoundCue, StateSnapshot};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    cue_id: Uuid,
    #[serde(flatten)]
    outcome: TriggerOutcome,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    status: StopOutcome,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::InvalidState(_) => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_provider_error() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", err),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "cuedeck-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Cue Endpoints
// ============================================================================

/// GET /cues - all cues in the store
pub async fn list_cues(State(ctx): State<AppContext>) -> Result<Json<Vec<SoundCue>>, ApiError> {
    ctx.store.cues().await.map(Json).map_err(api_error)
}

/// POST /cues/:cue_id/trigger
pub async fn trigger_cue(
    State(ctx): State<AppContext>,
    Path(cue_id): Path<Uuid>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let cue = ctx.store.cue(cue_id).await.map_err(api_error)?;
    info!("Trigger requested for '{}'", cue.name);
    let outcome = ctx.orchestrator.trigger(cue).await.map_err(api_error)?;
    Ok(Json(TriggerResponse { cue_id, outcome }))
}

/// POST /cues/:cue_id/preview - play the track only
pub async fn preview_cue(
    State(ctx): State<AppContext>,
    Path(cue_id): Path<Uuid>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let cue = ctx.store.cue(cue_id).await.map_err(api_error)?;
    info!("Preview requested for '{}'", cue.name);
    let outcome = ctx.orchestrator.preview(cue).await.map_err(api_error)?;
    Ok(Json(TriggerResponse { cue_id, outcome }))
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// POST /playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> Result<Json<StopResponse>, ApiError> {
    let status = ctx.orchestrator.stop().await.map_err(api_error)?;
    Ok(Json(StopResponse { status }))
}

/// GET /playback/state - latest published snapshot
pub async fn get_state(State(ctx): State<AppContext>) -> Json<StateSnapshot> {
    Json(ctx.orchestrator.snapshot())
}

/// POST /playback/notice/dismiss
pub async fn dismiss_notice(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    ctx.orchestrator.dismiss_notice().await.map_err(api_error)?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// GET /playback/diagnostics
pub async fn get_diagnostics(State(ctx): State<AppContext>) -> Result<Json<Diagnostics>, ApiError> {
    ctx.orchestrator.diagnostics().await.map(Json).map_err(api_error)
}

// ============================================================================
// Speech Endpoints
// ============================================================================

/// GET /speech/quota
pub async fn get_speech_quota(State(ctx): State<AppContext>) -> Result<Json<QuotaStatus>, ApiError> {
    match &ctx.quota {
        Some(quota) => Ok(Json(quota.status().await)),
        None => Err(api_error(Error::NotFound(
            "cloud speech is not configured".to_string(),
        ))),
    }
}

// ============================================================================
// Streaming Authorization
// ============================================================================

/// GET /streaming/callback - forward the redirect URL to the streaming adapter
pub async fn streaming_callback(
    State(ctx): State<AppContext>,
    uri: Uri,
) -> Result<Json<StatusResponse>, ApiError> {
    let url = uri.to_string();
    match ctx.backends.handle_callback_url(&url).await {
        Ok(true) => {
            info!("Streaming authorization completed");
            Ok(Json(StatusResponse {
                status: "connected".to_string(),
            }))
        }
        Ok(false) => {
            warn!("Callback URL not recognized: {}", url);
            Err((
                StatusCode::BAD_REQUEST,
                Json(StatusResponse {
                    status: "error: callback not recognized".to_string(),
                }),
            ))
        }
        Err(e) => Err(api_error(e)),
    }
}

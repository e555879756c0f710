use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{upload_to_response, RefreshParams, UploadResponse};
use crate::api::extractors::Actor;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend};
use crate::storage::models::{ModerationStats, UploadStatus};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub upload_id: String,
}

#[derive(Debug, Serialize)]
pub struct ModerateResponse {
    pub success: bool,
    pub upload_id: String,
    pub status: UploadStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// Pending uploads across the caller's events, oldest first.
pub async fn moderation_queue(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    AppQuery(params): AppQuery<RefreshParams>,
) -> Result<Json<JSend<Vec<UploadResponse>>>, ApiError> {
    let queue = state
        .cache
        .get_pending_queue(&actor_id, params.force_refresh)
        .await?;

    Ok(JSend::success(
        queue
            .iter()
            .map(|u| upload_to_response(u, state.uploads.public_url(&u.image_ref)))
            .collect(),
    ))
}

pub async fn moderation_stats(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
) -> Result<Json<JSend<ModerationStats>>, ApiError> {
    Ok(JSend::success(state.db.owner_stats(&actor_id)?))
}

pub async fn approve_upload(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    AppJson(req): AppJson<ModerateRequest>,
) -> Result<Json<JSend<ModerateResponse>>, ApiError> {
    let moderated = state.moderation.approve(&req.upload_id, &actor_id).await?;
    state
        .cache
        .record_approved(&moderated.upload, &moderated.owner_id)
        .await;

    Ok(JSend::success(ModerateResponse {
        success: true,
        upload_id: moderated.upload.id,
        status: moderated.upload.status,
    }))
}

pub async fn reject_upload(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    AppJson(req): AppJson<ModerateRequest>,
) -> Result<Json<JSend<ModerateResponse>>, ApiError> {
    let moderated = state.moderation.reject(&req.upload_id, &actor_id).await?;
    state
        .cache
        .record_rejected(&moderated.upload, &moderated.owner_id)
        .await;

    Ok(JSend::success(ModerateResponse {
        success: true,
        upload_id: moderated.upload.id,
        status: moderated.upload.status,
    }))
}

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, JSend};
use crate::pipeline::naming::validate_event_id;
use crate::storage::models::Event;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PutEventRequest {
    pub owner_id: String,
    #[serde(default = "default_max_photos")]
    pub max_photos: u32,
    #[serde(default = "default_true")]
    pub allow_photo_upload: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_max_photos() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Handlers
// ============================================================================

/// Register or update the pipeline's view of an event. Called by the service
/// that owns events, not by end users.
pub async fn put_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    AppJson(req): AppJson<PutEventRequest>,
) -> Result<Json<JSend<Event>>, ApiError> {
    validate_event_id(&event_id)?;

    let owner_id = req.owner_id.trim();
    if owner_id.is_empty() {
        return Err(ApiError::bad_request("owner_id must not be empty"));
    }

    let event = Event {
        id: event_id,
        owner_id: owner_id.to_string(),
        max_photos: req.max_photos,
        allow_photo_upload: req.allow_photo_upload,
        is_public: req.is_public,
        updated_at: Utc::now(),
    };
    state.db.put_event(&event)?;

    // Owner or visibility may have changed.
    state
        .cache
        .record_event_owner(&event.id, &event.owner_id)
        .await;

    tracing::debug!(event_id = %event.id, owner_id = %event.owner_id, "Registered event");
    Ok(JSend::success(event))
}

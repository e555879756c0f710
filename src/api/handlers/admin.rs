use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub uploads_deleted: u64,
    pub events_deleted: u64,
    pub reactions_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Wipe all metadata. Blobs are left in place.
pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state.db.purge_all()?;
    state.cache.clear().await;

    tracing::warn!(
        uploads = stats.uploads,
        events = stats.events,
        reactions = stats.reactions,
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        uploads_deleted: stats.uploads,
        events_deleted: stats.events,
        reactions_deleted: stats.reactions,
    }))
}

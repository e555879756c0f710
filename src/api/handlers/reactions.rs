use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::RefreshParams;
use crate::api::extractors::ReactionActor;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend};
use crate::pipeline::ReactionSummary;
use crate::storage::models::ToggleOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleReactionRequest {
    pub reaction_type: String,
}

pub async fn toggle_reaction(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<String>,
    ReactionActor(actor): ReactionActor,
    AppJson(req): AppJson<ToggleReactionRequest>,
) -> Result<Json<JSend<ToggleOutcome>>, ApiError> {
    let outcome = state
        .reactions
        .toggle(&upload_id, &actor, &req.reaction_type)?;
    state
        .cache
        .record_reaction(&upload_id, &req.reaction_type, outcome.count)
        .await;

    Ok(JSend::success(outcome))
}

/// Counts per reaction type, plus the types the caller has used when the
/// caller can be identified.
pub async fn reaction_summary(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<String>,
    actor: Option<ReactionActor>,
    AppQuery(params): AppQuery<RefreshParams>,
) -> Result<Json<JSend<ReactionSummary>>, ApiError> {
    let summary = state
        .reactions
        .summary(
            &upload_id,
            actor.as_ref().map(|ReactionActor(key)| key),
            &state.cache,
            params.force_refresh,
        )
        .await?;

    Ok(JSend::success(summary))
}

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::{
    multipart_error, read_file_field, read_text_field, upload_to_response, RefreshParams,
    UploadResponse,
};
use crate::api::extractors::Actor;
use crate::api::response::{ApiError, AppQuery, JSend};
use crate::pipeline::{
    assert_ownership, ensure_accepting_uploads, CoverImage, IncomingFile, PipelineError,
    ValidationError,
};
use crate::storage::models::{Event, ModerationStats};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub successes: Vec<UploadResponse>,
    pub errors: Vec<String>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit one guest photo. Multipart fields: `file`, `uploader_label`, `caption`.
pub async fn submit_upload(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    let event = load_event(&state, &event_id)?;

    let mut file: Option<IncomingFile> = None;
    let mut uploader_label: Option<String> = None;
    let mut caption: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => file = Some(read_file_field(field).await?),
            "uploader_label" => {
                uploader_label = Some(read_text_field(field, "uploader_label").await?)
            }
            "caption" => caption = Some(read_text_field(field, "caption").await?),
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("file field is required"))?;

    let current = state.db.count_event_uploads(&event.id)?;
    ensure_accepting_uploads(&event, current, 1)?;

    let upload = state
        .uploads
        .submit(
            file,
            &event.id,
            uploader_label.as_deref(),
            caption.as_deref(),
        )
        .await?;

    state.cache.record_ingested(&upload, &event.owner_id).await;

    let url = state.uploads.public_url(&upload.image_ref);
    Ok(JSend::success(upload_to_response(&upload, url)))
}

/// Submit several guest photos. Multipart fields: `files` (repeated), `uploader_label`.
///
/// Per-file failures do not fail the request; they are listed in `errors`.
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<JSend<BatchResponse>>, ApiError> {
    let event = load_event(&state, &event_id)?;
    let max_files = state.uploads.limits().max_batch_files;

    let mut files: Vec<IncomingFile> = Vec::new();
    let mut uploader_label: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "files" | "files[]" => {
                if files.len() == max_files {
                    return Err(ValidationError::BatchTooLarge {
                        count: files.len() + 1,
                        max: max_files,
                    }
                    .into());
                }
                files.push(read_file_field(field).await?);
            }
            "uploader_label" => {
                uploader_label = Some(read_text_field(field, "uploader_label").await?)
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ValidationError::NoFiles.into());
    }

    if !event.allow_photo_upload {
        return Err(ValidationError::UploadsDisabled.into());
    }

    let current = state.db.count_event_uploads(&event.id)?;
    let result = state
        .uploads
        .submit_many_into(files, &event, current, uploader_label.as_deref())
        .await;

    for upload in &result.successes {
        state.cache.record_ingested(upload, &event.owner_id).await;
    }

    let total = result.total();
    let successes = result
        .successes
        .iter()
        .map(|u| upload_to_response(u, state.uploads.public_url(&u.image_ref)))
        .collect();

    Ok(JSend::success(BatchResponse {
        successes,
        errors: result.errors,
        total,
    }))
}

/// Approved uploads of an event, newest first. Private events are visible to
/// their owner only.
pub async fn list_event_uploads(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    actor: Option<Actor>,
    AppQuery(params): AppQuery<RefreshParams>,
) -> Result<Json<JSend<Vec<UploadResponse>>>, ApiError> {
    let event = load_event(&state, &event_id)?;

    if !event.is_public {
        let actor_id = actor.as_ref().map(|Actor(id)| id.as_str()).unwrap_or("");
        assert_ownership(actor_id, &event.owner_id)?;
    }

    let uploads = state
        .cache
        .get_event_uploads(&event.id, params.force_refresh)
        .await?;

    Ok(JSend::success(
        uploads
            .iter()
            .map(|u| upload_to_response(u, state.uploads.public_url(&u.image_ref)))
            .collect(),
    ))
}

pub async fn event_stats(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Actor(actor_id): Actor,
    AppQuery(params): AppQuery<RefreshParams>,
) -> Result<Json<JSend<ModerationStats>>, ApiError> {
    let event = load_event(&state, &event_id)?;
    assert_ownership(&actor_id, &event.owner_id)?;

    let stats = state
        .cache
        .get_stats(&event.id, params.force_refresh)
        .await?;
    Ok(JSend::success(stats))
}

/// Store a cover image for an event. Multipart field: `file`.
pub async fn upload_cover(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Actor(actor_id): Actor,
    mut multipart: Multipart,
) -> Result<Json<JSend<CoverImage>>, ApiError> {
    let event = load_event(&state, &event_id)?;
    assert_ownership(&actor_id, &event.owner_id)?;

    let mut file: Option<IncomingFile> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            file = Some(read_file_field(field).await?);
        }
    }
    let file = file.ok_or_else(|| ApiError::bad_request("file field is required"))?;

    let cover = state.uploads.store_cover_image(file, &event.id).await?;
    Ok(JSend::success(cover))
}

// ============================================================================
// Helpers
// ============================================================================

fn load_event(state: &AppState, event_id: &str) -> Result<Event, ApiError> {
    state
        .db
        .get_event(event_id)?
        .ok_or_else(|| PipelineError::NotFound(format!("event '{event_id}'")).into())
}

mod admin;
mod events;
mod moderation;
mod reactions;
mod static_files;
mod uploads;

use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::response::ApiError;
use crate::pipeline::IncomingFile;
use crate::storage::models::{Upload, UploadStatus};

pub use admin::{admin_purge, health};
pub use events::put_event;
pub use moderation::{approve_upload, moderation_queue, moderation_stats, reject_upload};
pub use reactions::{reaction_summary, toggle_reaction};
pub use static_files::serve_static;
pub use uploads::{event_stats, list_event_uploads, submit_batch, submit_upload, upload_cover};

// ============================================================================
// Shared types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub event_id: String,
    pub image_ref: String,
    pub url: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub status: UploadStatus,
    pub uploader_label: Option<String>,
    pub caption: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    #[serde(default)]
    pub force_refresh: bool,
}

// ============================================================================
// Helpers
// ============================================================================

fn upload_to_response(upload: &Upload, url: String) -> UploadResponse {
    UploadResponse {
        id: upload.id.clone(),
        event_id: upload.event_id.clone(),
        image_ref: upload.image_ref.clone(),
        url,
        mime_type: upload.mime_type.clone(),
        byte_size: upload.byte_size,
        status: upload.status,
        uploader_label: upload.uploader_label.clone(),
        caption: upload.caption.clone(),
        approved_by: upload.approved_by.clone(),
        created_at: upload.created_at.to_rfc3339(),
        updated_at: upload.updated_at.to_rfc3339(),
    }
}

/// Map a multipart read failure, keeping body-limit rejections as 413.
fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(format!("Request body too large: {}", e.body_text()))
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}

async fn read_file_field(field: Field<'_>) -> Result<IncomingFile, ApiError> {
    let file_name = field.file_name().map(|s| s.to_string());
    let content_type = field.content_type().map(|s| s.to_string());
    let data = field.bytes().await.map_err(multipart_error)?;

    Ok(IncomingFile {
        file_name,
        content_type,
        data,
    })
}

async fn read_text_field(field: Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid {name}: {}", e.body_text())))
}

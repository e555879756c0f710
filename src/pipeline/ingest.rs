use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::naming::{generate_file_name, object_key, resolve_mime_type, validate_event_id};
use super::{IncomingFile, PipelineError, UploadContext, ValidationError};
use crate::config::UploadLimits;
use crate::object_store::ObjectStore;
use crate::storage::models::{Event, Upload, UploadStatus};
use crate::storage::Database;

pub const MAX_LABEL_CHARS: usize = 100;
pub const MAX_CAPTION_CHARS: usize = 500;

/// A stored cover image. Cover images have no upload row.
#[derive(Debug, Clone, Serialize)]
pub struct CoverImage {
    pub image_ref: String,
    pub url: String,
}

/// Validates guest photos and persists them as pending uploads.
#[derive(Clone)]
pub struct UploadService {
    db: Database,
    object_store: Arc<dyn ObjectStore>,
    limits: UploadLimits,
}

/// Check that an event can take `incoming` more photos. Called by whoever
/// resolved the event before handing files to the service.
pub fn ensure_accepting_uploads(
    event: &Event,
    current: u64,
    incoming: u64,
) -> Result<(), ValidationError> {
    if !event.allow_photo_upload {
        return Err(ValidationError::UploadsDisabled);
    }
    if current.saturating_add(incoming) > u64::from(event.max_photos) {
        return Err(ValidationError::EventFull {
            max_photos: event.max_photos,
        });
    }
    Ok(())
}

/// Trim free text; blank becomes `None`.
fn normalize_text(
    value: Option<&str>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(text) = value.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > max {
        return Err(ValidationError::TextTooLong { field, max });
    }
    Ok(Some(text.to_string()))
}

impl UploadService {
    pub fn new(db: Database, object_store: Arc<dyn ObjectStore>, limits: UploadLimits) -> Self {
        Self {
            db,
            object_store,
            limits,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub fn public_url(&self, image_ref: &str) -> String {
        self.object_store.public_url(image_ref)
    }

    /// Check type and size against the limits for `context`, returning the
    /// resolved MIME type.
    pub fn validate_file(
        &self,
        file: &IncomingFile,
        context: UploadContext,
    ) -> Result<String, ValidationError> {
        let mime_type = resolve_mime_type(file.content_type.as_deref(), file.file_name.as_deref());
        if !self.limits.is_allowed_type(&mime_type) {
            return Err(ValidationError::UnsupportedType { mime_type });
        }

        let size = file.data.len() as u64;
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        let max = match context {
            UploadContext::GuestPhoto => self.limits.max_guest_upload_size,
            UploadContext::CoverImage => self.limits.max_cover_image_size,
        };
        if size > max {
            return Err(ValidationError::TooLarge { context, size, max });
        }

        Ok(mime_type)
    }

    /// Store a guest photo and create its pending upload row.
    ///
    /// The blob is written first. If the row cannot be inserted the blob is
    /// deleted again, so callers see either both or neither.
    pub async fn submit(
        &self,
        file: IncomingFile,
        event_id: &str,
        uploader_label: Option<&str>,
        caption: Option<&str>,
    ) -> Result<Upload, PipelineError> {
        let mime_type = self.validate_file(&file, UploadContext::GuestPhoto)?;
        let uploader_label = normalize_text(uploader_label, "uploader_label", MAX_LABEL_CHARS)?;
        let caption = normalize_text(caption, "caption", MAX_CAPTION_CHARS)?;
        validate_event_id(event_id)?;

        let now = Utc::now();
        let file_name = generate_file_name(file.file_name.as_deref(), &mime_type, now);
        let key = object_key(event_id, &file_name)?;
        let byte_size = file.data.len() as u64;

        self.object_store
            .put(&key, file.data)
            .await
            .inspect_err(|e| {
                tracing::error!(event_id = %event_id, key = %key, error = %e, "Failed to store photo");
            })?;

        let upload = Upload {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            image_ref: key.clone(),
            mime_type,
            byte_size,
            status: UploadStatus::Pending,
            created_at: now,
            updated_at: now,
            uploader_label,
            caption,
            approved_by: None,
        };

        if let Err(e) = self.db.insert_upload(&upload) {
            tracing::error!(event_id = %event_id, key = %key, error = %e, "Failed to record upload, removing blob");
            if let Err(cleanup) = self.object_store.delete(&key).await {
                tracing::warn!(key = %key, error = %cleanup, "Failed to remove orphaned blob");
            }
            return Err(e.into());
        }

        tracing::info!(upload_id = %upload.id, event_id = %event_id, bytes = byte_size, "Created pending upload");
        Ok(upload)
    }

    /// Store an event cover image under the cover image limit.
    pub async fn store_cover_image(
        &self,
        file: IncomingFile,
        event_id: &str,
    ) -> Result<CoverImage, PipelineError> {
        let mime_type = self.validate_file(&file, UploadContext::CoverImage)?;
        let file_name = generate_file_name(Some("cover"), &mime_type, Utc::now());
        let key = object_key(event_id, &file_name)?;

        self.object_store.put(&key, file.data).await.inspect_err(|e| {
            tracing::error!(event_id = %event_id, key = %key, error = %e, "Failed to store cover image");
        })?;

        tracing::info!(event_id = %event_id, key = %key, "Stored cover image");
        Ok(CoverImage {
            url: self.object_store.public_url(&key),
            image_ref: key,
        })
    }
}

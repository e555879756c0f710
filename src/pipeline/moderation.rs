use std::sync::Arc;

use chrono::Utc;

use super::PipelineError;
use crate::object_store::ObjectStore;
use crate::storage::models::{GuardedWrite, Upload, UploadStatus};
use crate::storage::Database;

/// The single authorization rule for moderation: only the event owner acts.
pub fn assert_ownership(actor_id: &str, owner_id: &str) -> Result<(), PipelineError> {
    if actor_id.is_empty() || actor_id != owner_id {
        return Err(PipelineError::Authorization);
    }
    Ok(())
}

/// A moderated upload plus the owner of its event, for cache bookkeeping.
#[derive(Debug, Clone)]
pub struct Moderated {
    pub upload: Upload,
    pub owner_id: String,
}

/// Moves uploads out of `pending`. Both transitions end in a guarded write,
/// so when two moderators race on one upload the second gets
/// `AlreadyModerated` instead of overwriting the first.
#[derive(Clone)]
pub struct ModerationEngine {
    db: Database,
    object_store: Arc<dyn ObjectStore>,
}

impl ModerationEngine {
    pub fn new(db: Database, object_store: Arc<dyn ObjectStore>) -> Self {
        Self { db, object_store }
    }

    /// Load an upload and run the ownership and pending checks shared by
    /// both transitions.
    fn load_pending(&self, upload_id: &str, actor_id: &str) -> Result<(Upload, String), PipelineError> {
        let (upload, owner_id) = self
            .db
            .get_upload_with_owner(upload_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("upload '{upload_id}'")))?;

        assert_ownership(actor_id, &owner_id)?;

        if upload.status.is_terminal() {
            return Err(PipelineError::AlreadyModerated {
                id: upload.id,
                status: upload.status,
            });
        }

        Ok((upload, owner_id))
    }

    pub async fn approve(&self, upload_id: &str, actor_id: &str) -> Result<Moderated, PipelineError> {
        let (_, owner_id) = self.load_pending(upload_id, actor_id)?;

        match self.db.approve_if_pending(upload_id, actor_id)? {
            GuardedWrite::Applied(upload) => {
                tracing::info!(upload_id = %upload_id, event_id = %upload.event_id, actor_id = %actor_id, "Approved upload");
                Ok(Moderated { upload, owner_id })
            }
            GuardedWrite::Conflict(status) => {
                tracing::info!(upload_id = %upload_id, status = status.as_str(), "Lost approval race");
                Err(PipelineError::AlreadyModerated {
                    id: upload_id.to_string(),
                    status,
                })
            }
            // The row vanished between the check and the write: someone rejected it.
            GuardedWrite::Missing => Err(PipelineError::AlreadyModerated {
                id: upload_id.to_string(),
                status: UploadStatus::Rejected,
            }),
        }
    }

    /// Delete the row, then remove the blob. Blob removal is best-effort: a
    /// leftover object is preferable to a photo stuck in moderation.
    pub async fn reject(&self, upload_id: &str, actor_id: &str) -> Result<Moderated, PipelineError> {
        let (_, owner_id) = self.load_pending(upload_id, actor_id)?;

        let mut upload = match self.db.delete_if_pending(upload_id)? {
            GuardedWrite::Applied(upload) => upload,
            GuardedWrite::Conflict(status) => {
                tracing::info!(upload_id = %upload_id, status = status.as_str(), "Lost rejection race");
                return Err(PipelineError::AlreadyModerated {
                    id: upload_id.to_string(),
                    status,
                });
            }
            GuardedWrite::Missing => {
                return Err(PipelineError::AlreadyModerated {
                    id: upload_id.to_string(),
                    status: UploadStatus::Rejected,
                })
            }
        };

        if let Err(e) = self.object_store.delete(&upload.image_ref).await {
            tracing::warn!(
                upload_id = %upload_id,
                key = %upload.image_ref,
                error = %e,
                "Failed to delete rejected photo from object storage"
            );
        }

        upload.status = UploadStatus::Rejected;
        upload.updated_at = Utc::now();
        tracing::info!(upload_id = %upload_id, event_id = %upload.event_id, actor_id = %actor_id, "Rejected upload");
        Ok(Moderated { upload, owner_id })
    }
}

//! The upload and moderation pipeline: ingestion, batch ingestion, moderation
//! and reactions, built on the metadata database and the blob store.

mod batch;
mod ingest;
mod moderation;
pub mod naming;
mod reactions;

pub use batch::{BatchProgress, BatchResult};
pub use ingest::{ensure_accepting_uploads, CoverImage, UploadService};
pub use moderation::{assert_ownership, Moderated, ModerationEngine};
pub use reactions::{validate_reaction_type, ActorKey, ReactionService, ReactionSummary};

use bytes::Bytes;
use thiserror::Error;

use crate::object_store::ObjectStoreError;
use crate::storage::models::UploadStatus;
use crate::storage::DatabaseError;

/// Message shown to users when a storage backend fails. Details stay in the logs.
pub const RETRY_MESSAGE: &str = "Something went wrong while saving, please try again";

/// Which size limit applies to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadContext {
    GuestPhoto,
    CoverImage,
}

impl std::fmt::Display for UploadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadContext::GuestPhoto => f.write_str("guest photo"),
            UploadContext::CoverImage => f.write_str("cover image"),
        }
    }
}

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            data,
        }
    }

    /// Name used to label this file in batch error messages.
    pub fn display_name(&self) -> &str {
        self.file_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("unnamed file")
    }
}

/// A violated input constraint. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("file type '{mime_type}' is not an allowed image type")]
    UnsupportedType { mime_type: String },
    #[error("{context} is {size} bytes, the maximum is {max} bytes")]
    TooLarge {
        context: UploadContext,
        size: u64,
        max: u64,
    },
    #[error("file is empty")]
    EmptyFile,
    #[error("{field} must be at most {max} characters")]
    TextTooLong { field: &'static str, max: usize },
    #[error("event id '{0}' is not valid")]
    InvalidEventId(String),
    #[error("reaction type must be 1-32 characters of a-z, 0-9, '-' or '_'")]
    InvalidReactionType,
    #[error("actor identity contains invalid characters")]
    InvalidActorKey,
    #[error("no files were provided")]
    NoFiles,
    #[error("at most {max} files can be uploaded at once, got {count}")]
    BatchTooLarge { count: usize, max: usize },
    #[error("this event is not accepting photo uploads")]
    UploadsDisabled,
    #[error("this event has reached its limit of {max_photos} photos")]
    EventFull { max_photos: u32 },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("only the event owner can do this")]
    Authorization,
    #[error("{0} not found")]
    NotFound(String),
    #[error("upload '{id}' has already been {}", .status.as_str())]
    AlreadyModerated { id: String, status: UploadStatus },
    #[error("storage error: {0}")]
    Storage(#[from] ObjectStoreError),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// Message safe to show to the end user.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Storage(_)
            | PipelineError::Database(_)
            | PipelineError::Unexpected(_) => RETRY_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the failure is the caller's fault rather than the backend's.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PipelineError::Storage(_) | PipelineError::Database(_) | PipelineError::Unexpected(_)
        )
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation status of an upload. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Approved,
    Rejected,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Approved => "approved",
            UploadStatus::Rejected => "rejected",
        }
    }
}

/// A guest photo record stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    pub event_id: String,
    /// Object key in the blob store (`{event_id}/{file_name}`)
    pub image_ref: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub status: UploadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub uploader_label: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

/// The slice of an event the pipeline needs. Events are owned by the
/// surrounding application and registered here by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub owner_id: String,
    pub max_photos: u32,
    pub allow_photo_upload: bool,
    pub is_public: bool,
    pub updated_at: DateTime<Utc>,
}

/// Upload counts derived from upload rows, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationStats {
    pub pending_count: u64,
    pub approved_count: u64,
    pub event_count: u64,
}

/// Outcome of a guarded (compare-and-set) write.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardedWrite {
    /// The row matched the expected state and was written.
    Applied(Upload),
    /// The row exists but is no longer in the expected state.
    Conflict(UploadStatus),
    /// No row with that id.
    Missing,
}

impl GuardedWrite {
    /// Rows affected by the write: 1 when applied, 0 otherwise.
    pub fn rows_affected(&self) -> u64 {
        match self {
            GuardedWrite::Applied(_) => 1,
            GuardedWrite::Conflict(_) | GuardedWrite::Missing => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Added,
    Removed,
}

/// Result of toggling a reaction, computed inside the toggle transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub action: ToggleAction,
    pub count: u64,
    pub has_reacted: bool,
}

mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over the blob store that holds photo bytes.
/// Keys look like `{event_id}/{file_name}` and are relative to the configured bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
    /// List every key starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
    /// URL a browser can load the object from.
    fn public_url(&self, key: &str) -> String;
}

/// Reject keys that could escape the bucket or collide with hidden files.
pub fn validate_object_key(key: &str) -> Result<&str, ObjectStoreError> {
    let invalid = |reason| ObjectStoreError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("key cannot be empty"));
    }
    if key.len() > 512 {
        return Err(invalid("key exceeds 512 characters"));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(invalid("key must not start or end with '/'"));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(invalid("key contains a forbidden character"));
    }
    for segment in key.split('/') {
        if segment.is_empty() {
            return Err(invalid("key must not contain empty segments"));
        }
        if segment.starts_with('.') {
            return Err(invalid("key segments must not start with '.'"));
        }
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
    {
        return Err(invalid("allowed characters are a-zA-Z0-9, /, -, _, ."));
    }
    Ok(key)
}

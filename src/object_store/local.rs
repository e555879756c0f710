use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::{validate_object_key, ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and testing.
pub struct LocalStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            public_base_url: String::new(),
        })
    }

    /// Public URLs become `{base}/static/{key}`, served by the `/static` route.
    pub fn with_public_base_url(mut self, base: &str) -> Self {
        self.public_base_url = base.trim_end_matches('/').to_string();
        self
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let key = validate_object_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(key)?;
        if !path.is_file() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if path.is_file() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(key)?;
        Ok(path.is_file())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.base_path) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/static/{key}", self.public_base_url)
    }
}

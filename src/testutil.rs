//! Shared test helpers for handler tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, StorageConfig, UploadLimits};
use crate::object_store::LocalStore;
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with_limits(temp_dir, UploadLimits::default())
}

pub fn test_state_with_limits(temp_dir: &tempfile::TempDir, limits: UploadLimits) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
            public_base_url: "http://photos.test".to_string(),
            ..StorageConfig::default()
        },
        uploads: limits,
        test_mode: true,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(files_dir.join(&config.storage.bucket))
        .expect("Failed to create test object store")
        .with_public_base_url(&config.storage.public_base_url);

    Arc::new(AppState::new(config, db, Arc::new(object_store)))
}

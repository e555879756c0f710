#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use event_photos::config::UploadLimits;
use event_photos::object_store::{LocalStore, ObjectStore, ObjectStoreError};
use event_photos::pipeline::{IncomingFile, ModerationEngine, ReactionService, UploadService};
use event_photos::storage::models::Event;
use event_photos::storage::Database;

/// Wraps a real store and can be told to fail puts or deletes.
pub struct FlakyStore {
    inner: LocalStore,
    pub fail_puts: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: LocalStore) -> Self {
        Self {
            inner,
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("simulated put failure".into()));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("simulated delete failure".into()));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        self.inner.list(prefix).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }
}

pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub db: Database,
    pub store: Arc<FlakyStore>,
    pub uploads: UploadService,
    pub moderation: ModerationEngine,
    pub reactions: ReactionService,
}

pub fn harness() -> Harness {
    harness_with_limits(UploadLimits::default())
}

pub fn harness_with_limits(limits: UploadLimits) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let local = LocalStore::new(dir.path().join("files")).unwrap();
    let store = Arc::new(FlakyStore::new(local));
    let object_store: Arc<dyn ObjectStore> = store.clone();

    Harness {
        uploads: UploadService::new(db.clone(), Arc::clone(&object_store), limits),
        moderation: ModerationEngine::new(db.clone(), object_store),
        reactions: ReactionService::new(db.clone()),
        db,
        store,
        _dir: dir,
    }
}

impl Harness {
    pub fn register_event(&self, event_id: &str, owner_id: &str) {
        self.db
            .put_event(&Event {
                id: event_id.to_string(),
                owner_id: owner_id.to_string(),
                max_photos: 500,
                allow_photo_upload: true,
                is_public: true,
                updated_at: Utc::now(),
            })
            .unwrap();
    }

    pub async fn blob_keys(&self) -> Vec<String> {
        self.store.list("").await.unwrap()
    }
}

pub fn jpeg(name: &str, size: usize) -> IncomingFile {
    IncomingFile::new(name, "image/jpeg", Bytes::from(vec![0xFFu8; size]))
}

pub fn png(name: &str, size: usize) -> IncomingFile {
    IncomingFile::new(name, "image/png", Bytes::from(vec![0x89u8; size]))
}

//! event-photos - Guest photo uploads and host moderation for events
//!
//! This crate provides:
//! - Validated photo ingestion into swappable object storage (local filesystem, GCS)
//! - Upload metadata in a redb embedded database (ACID, crash-safe)
//! - Race-safe approve/reject moderation through guarded writes
//! - An explicit read cache and per-photo reaction toggles
//! - A REST API with multipart upload support

pub mod api;
pub mod cache;
pub mod config;
pub mod object_store;
pub mod pipeline;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use cache::UploadCache;
use config::Config;
use pipeline::{ModerationEngine, ReactionService, UploadService};
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    pub cache: UploadCache,
    pub uploads: UploadService,
    pub moderation: ModerationEngine,
    pub reactions: ReactionService,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        object_store: Arc<dyn object_store::ObjectStore>,
    ) -> Self {
        let uploads = UploadService::new(
            db.clone(),
            Arc::clone(&object_store),
            config.uploads.clone(),
        );
        let moderation = ModerationEngine::new(db.clone(), Arc::clone(&object_store));
        let reactions = ReactionService::new(db.clone());
        let cache = UploadCache::new(Arc::new(db.clone()));

        Self {
            config,
            db,
            object_store,
            cache,
            uploads,
            moderation,
            reactions,
        }
    }
}

//! Read cache for upload lists, pending queues, stats and reaction counts.
//!
//! The cache is an explicit object owned by [`AppState`](crate::AppState).
//! Reads are cache-first unless `force_refresh` is set. Every mutation in the
//! pipeline is followed by one of the `record_*` calls or by
//! [`UploadCache::invalidate`]; nothing refreshes in the background, so a
//! read can be stale until the next explicit refresh.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::models::{ModerationStats, Upload, UploadStatus};
use crate::storage::{Database, DatabaseError};

/// Where the cache loads from on a miss.
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Approved uploads of an event, newest first.
    async fn approved_uploads(&self, event_id: &str) -> Result<Vec<Upload>, DatabaseError>;
    /// Pending uploads across the owner's events, oldest first.
    async fn pending_uploads(&self, owner_id: &str) -> Result<Vec<Upload>, DatabaseError>;
    async fn event_stats(&self, event_id: &str) -> Result<ModerationStats, DatabaseError>;
    async fn reaction_counts(&self, upload_id: &str)
        -> Result<BTreeMap<String, u64>, DatabaseError>;
}

#[async_trait]
impl UploadSource for Database {
    async fn approved_uploads(&self, event_id: &str) -> Result<Vec<Upload>, DatabaseError> {
        let mut uploads = self.list_event_uploads(event_id, Some(UploadStatus::Approved))?;
        sort_newest_first(&mut uploads);
        Ok(uploads)
    }

    async fn pending_uploads(&self, owner_id: &str) -> Result<Vec<Upload>, DatabaseError> {
        self.pending_for_owner(owner_id)
    }

    async fn event_stats(&self, event_id: &str) -> Result<ModerationStats, DatabaseError> {
        Database::event_stats(self, event_id)
    }

    async fn reaction_counts(
        &self,
        upload_id: &str,
    ) -> Result<BTreeMap<String, u64>, DatabaseError> {
        Database::reaction_counts(self, upload_id)
    }
}

fn sort_newest_first(uploads: &mut [Upload]) {
    uploads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[derive(Default)]
struct CacheState {
    /// event_id -> approved uploads, newest first
    event_uploads: HashMap<String, Vec<Upload>>,
    /// owner_id -> pending uploads, oldest first
    pending: HashMap<String, Vec<Upload>>,
    /// event_id -> stats
    stats: HashMap<String, ModerationStats>,
    /// upload_id -> reaction type -> count
    reactions: HashMap<String, BTreeMap<String, u64>>,
    /// event_id -> owner_id, learned from queue loads and `record_*` calls
    event_owners: HashMap<String, String>,
}

impl CacheState {
    fn note_owner(&mut self, event_id: &str, owner_id: &str) {
        if self.event_owners.get(event_id).map(String::as_str) != Some(owner_id) {
            self.event_owners
                .insert(event_id.to_string(), owner_id.to_string());
        }
    }
}

pub struct UploadCache {
    source: Arc<dyn UploadSource>,
    state: RwLock<CacheState>,
}

impl UploadCache {
    pub fn new(source: Arc<dyn UploadSource>) -> Self {
        Self {
            source,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub async fn get_event_uploads(
        &self,
        event_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<Upload>, DatabaseError> {
        if !force_refresh {
            if let Some(uploads) = self.state.read().await.event_uploads.get(event_id) {
                return Ok(uploads.clone());
            }
        }

        let uploads = self.source.approved_uploads(event_id).await?;
        self.state
            .write()
            .await
            .event_uploads
            .insert(event_id.to_string(), uploads.clone());
        Ok(uploads)
    }

    pub async fn get_pending_queue(
        &self,
        owner_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<Upload>, DatabaseError> {
        if !force_refresh {
            if let Some(queue) = self.state.read().await.pending.get(owner_id) {
                return Ok(queue.clone());
            }
        }

        let queue = self.source.pending_uploads(owner_id).await?;
        let mut state = self.state.write().await;
        for upload in &queue {
            state.note_owner(&upload.event_id, owner_id);
        }
        state.pending.insert(owner_id.to_string(), queue.clone());
        Ok(queue)
    }

    pub async fn get_stats(
        &self,
        event_id: &str,
        force_refresh: bool,
    ) -> Result<ModerationStats, DatabaseError> {
        if !force_refresh {
            if let Some(stats) = self.state.read().await.stats.get(event_id) {
                return Ok(*stats);
            }
        }

        let stats = self.source.event_stats(event_id).await?;
        self.state
            .write()
            .await
            .stats
            .insert(event_id.to_string(), stats);
        Ok(stats)
    }

    pub async fn get_reaction_counts(
        &self,
        upload_id: &str,
        force_refresh: bool,
    ) -> Result<BTreeMap<String, u64>, DatabaseError> {
        if !force_refresh {
            if let Some(counts) = self.state.read().await.reactions.get(upload_id) {
                return Ok(counts.clone());
            }
        }

        let counts = self.source.reaction_counts(upload_id).await?;
        self.state
            .write()
            .await
            .reactions
            .insert(upload_id.to_string(), counts.clone());
        Ok(counts)
    }

    /// Drop everything cached for an event, including its owner's pending
    /// queue. When the owner is not known yet every pending queue is dropped.
    pub async fn invalidate(&self, event_id: &str) {
        let mut state = self.state.write().await;
        state.event_uploads.remove(event_id);
        state.stats.remove(event_id);
        match state.event_owners.get(event_id).cloned() {
            Some(owner_id) => {
                state.pending.remove(&owner_id);
                state
                    .pending
                    .retain(|_, queue| !queue.iter().any(|u| u.event_id == event_id));
            }
            None => state.pending.clear(),
        }
        tracing::debug!(event_id = %event_id, "Invalidated cached event");
    }

    /// An event was registered or changed hands. Drops the cached event along
    /// with the queues of its previous and new owners.
    pub async fn record_event_owner(&self, event_id: &str, owner_id: &str) {
        self.invalidate(event_id).await;
        let mut state = self.state.write().await;
        state.pending.remove(owner_id);
        state.note_owner(event_id, owner_id);
    }

    /// Forget everything.
    pub async fn clear(&self) {
        *self.state.write().await = CacheState::default();
    }

    /// Re-fetch an event's approved list and stats.
    pub async fn refresh(&self, event_id: &str) -> Result<(), DatabaseError> {
        self.get_event_uploads(event_id, true).await?;
        self.get_stats(event_id, true).await?;
        Ok(())
    }

    /// A new pending upload exists for an event owned by `owner_id`.
    pub async fn record_ingested(&self, upload: &Upload, owner_id: &str) {
        let mut state = self.state.write().await;
        state.note_owner(&upload.event_id, owner_id);
        if let Some(queue) = state.pending.get_mut(owner_id) {
            if !queue.iter().any(|u| u.id == upload.id) {
                queue.push(upload.clone());
            }
        }
        if let Some(stats) = state.stats.get_mut(&upload.event_id) {
            stats.pending_count += 1;
        }
    }

    /// `upload` (already in its approved state) left the pending queue.
    pub async fn record_approved(&self, upload: &Upload, owner_id: &str) {
        let mut state = self.state.write().await;
        state.note_owner(&upload.event_id, owner_id);
        let was_queued = remove_from(state.pending.get_mut(owner_id), &upload.id);

        if let Some(list) = state.event_uploads.get_mut(&upload.event_id) {
            if !list.iter().any(|u| u.id == upload.id) {
                list.push(upload.clone());
                sort_newest_first(list);
            }
        }
        if let Some(stats) = state.stats.get_mut(&upload.event_id) {
            stats.pending_count = stats.pending_count.saturating_sub(1);
            stats.approved_count += 1;
        }
        tracing::trace!(upload_id = %upload.id, was_queued, "Cache recorded approval");
    }

    /// `upload` was rejected and deleted.
    pub async fn record_rejected(&self, upload: &Upload, owner_id: &str) {
        let mut state = self.state.write().await;
        state.note_owner(&upload.event_id, owner_id);
        remove_from(state.pending.get_mut(owner_id), &upload.id);
        remove_from(state.event_uploads.get_mut(&upload.event_id), &upload.id);
        if let Some(stats) = state.stats.get_mut(&upload.event_id) {
            stats.pending_count = stats.pending_count.saturating_sub(1);
        }
        state.reactions.remove(&upload.id);
    }

    /// A toggle left `count` reactions of `reaction_type` on an upload.
    pub async fn record_reaction(&self, upload_id: &str, reaction_type: &str, count: u64) {
        let mut state = self.state.write().await;
        if let Some(counts) = state.reactions.get_mut(upload_id) {
            if count == 0 {
                counts.remove(reaction_type);
            } else {
                counts.insert(reaction_type.to_string(), count);
            }
        }
    }
}

/// Remove an upload from an optional cached list, reporting whether it was there.
fn remove_from(list: Option<&mut Vec<Upload>>, upload_id: &str) -> bool {
    match list {
        Some(list) => {
            let before = list.len();
            list.retain(|u| u.id != upload_id);
            list.len() != before
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn upload(id: &str, event_id: &str, status: UploadStatus, age_secs: i64) -> Upload {
        let at = Utc::now() - Duration::seconds(age_secs);
        Upload {
            id: id.to_string(),
            event_id: event_id.to_string(),
            image_ref: format!("{event_id}/{id}.jpg"),
            mime_type: "image/jpeg".to_string(),
            byte_size: 10,
            status,
            created_at: at,
            updated_at: at,
            uploader_label: None,
            caption: None,
            approved_by: None,
        }
    }

    /// In-memory source that counts how often it is hit.
    #[derive(Default)]
    struct FakeSource {
        uploads: Mutex<Vec<Upload>>,
        owners: Mutex<HashMap<String, String>>,
        reactions: Mutex<HashMap<String, BTreeMap<String, u64>>>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UploadSource for FakeSource {
        async fn approved_uploads(&self, event_id: &str) -> Result<Vec<Upload>, DatabaseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut list: Vec<Upload> = self
                .uploads
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.event_id == event_id && u.status == UploadStatus::Approved)
                .cloned()
                .collect();
            sort_newest_first(&mut list);
            Ok(list)
        }

        async fn pending_uploads(&self, owner_id: &str) -> Result<Vec<Upload>, DatabaseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let owners = self.owners.lock().unwrap();
            Ok(self
                .uploads
                .lock()
                .unwrap()
                .iter()
                .filter(|u| {
                    u.status == UploadStatus::Pending
                        && owners.get(&u.event_id).map(String::as_str) == Some(owner_id)
                })
                .cloned()
                .collect())
        }

        async fn event_stats(&self, event_id: &str) -> Result<ModerationStats, DatabaseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let uploads = self.uploads.lock().unwrap();
            let of_event = uploads.iter().filter(|u| u.event_id == event_id);
            let mut stats = ModerationStats {
                event_count: 1,
                ..Default::default()
            };
            for u in of_event {
                match u.status {
                    UploadStatus::Pending => stats.pending_count += 1,
                    UploadStatus::Approved => stats.approved_count += 1,
                    UploadStatus::Rejected => {}
                }
            }
            Ok(stats)
        }

        async fn reaction_counts(
            &self,
            upload_id: &str,
        ) -> Result<BTreeMap<String, u64>, DatabaseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .reactions
                .lock()
                .unwrap()
                .get(upload_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn setup() -> (Arc<FakeSource>, UploadCache) {
        let source = Arc::new(FakeSource::default());
        source
            .owners
            .lock()
            .unwrap()
            .insert("evt".to_string(), "host".to_string());
        let cache = UploadCache::new(source.clone());
        (source, cache)
    }

    #[tokio::test]
    async fn event_uploads_are_cache_first() {
        let (source, cache) = setup();
        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("a", "evt", UploadStatus::Approved, 10));

        assert_eq!(cache.get_event_uploads("evt", false).await.unwrap().len(), 1);
        assert_eq!(source.calls(), 1);

        // New data at the source is invisible until a forced refresh.
        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("b", "evt", UploadStatus::Approved, 5));
        assert_eq!(cache.get_event_uploads("evt", false).await.unwrap().len(), 1);
        assert_eq!(source.calls(), 1);

        let fresh = cache.get_event_uploads("evt", true).await.unwrap();
        assert_eq!(source.calls(), 2);
        assert_eq!(
            fresh.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
    }

    #[tokio::test]
    async fn approval_moves_item_from_pending_to_event_list() {
        let (source, cache) = setup();
        let pending = upload("p", "evt", UploadStatus::Pending, 1);
        source.uploads.lock().unwrap().push(pending.clone());
        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("old", "evt", UploadStatus::Approved, 100));

        assert_eq!(cache.get_pending_queue("host", false).await.unwrap().len(), 1);
        assert_eq!(cache.get_event_uploads("evt", false).await.unwrap().len(), 1);
        let stats = cache.get_stats("evt", false).await.unwrap();
        assert_eq!((stats.pending_count, stats.approved_count), (1, 1));
        let calls = source.calls();

        let mut approved = pending;
        approved.status = UploadStatus::Approved;
        cache.record_approved(&approved, "host").await;

        assert!(cache.get_pending_queue("host", false).await.unwrap().is_empty());
        let list = cache.get_event_uploads("evt", false).await.unwrap();
        assert_eq!(
            list.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
            vec!["p", "old"]
        );
        let stats = cache.get_stats("evt", false).await.unwrap();
        assert_eq!((stats.pending_count, stats.approved_count), (0, 2));
        assert_eq!(source.calls(), calls, "updates must not hit the source");
    }

    #[tokio::test]
    async fn rejection_removes_item_from_pending() {
        let (source, cache) = setup();
        let pending = upload("p", "evt", UploadStatus::Pending, 1);
        source.uploads.lock().unwrap().push(pending.clone());

        cache.get_pending_queue("host", false).await.unwrap();
        cache.get_stats("evt", false).await.unwrap();

        cache.record_rejected(&pending, "host").await;
        assert!(cache.get_pending_queue("host", false).await.unwrap().is_empty());
        assert_eq!(cache.get_stats("evt", false).await.unwrap().pending_count, 0);
    }

    #[tokio::test]
    async fn ingest_appends_to_cached_queue_only() {
        let (_source, cache) = setup();
        let fresh = upload("n", "evt", UploadStatus::Pending, 0);

        // Nothing cached yet: stays uncached, the next read fetches.
        cache.record_ingested(&fresh, "host").await;
        assert!(cache.get_pending_queue("host", false).await.unwrap().is_empty());

        cache.record_ingested(&fresh, "host").await;
        cache.record_ingested(&fresh, "host").await;
        let queue = cache.get_pending_queue("host", false).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, "n");
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let (source, cache) = setup();
        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("p", "evt", UploadStatus::Pending, 1));

        cache.get_event_uploads("evt", false).await.unwrap();
        cache.get_stats("evt", false).await.unwrap();
        cache.get_pending_queue("host", false).await.unwrap();
        let calls = source.calls();

        cache.invalidate("evt").await;
        cache.get_event_uploads("evt", false).await.unwrap();
        cache.get_stats("evt", false).await.unwrap();
        cache.get_pending_queue("host", false).await.unwrap();
        assert_eq!(source.calls(), calls + 3);
    }

    #[tokio::test]
    async fn invalidate_drops_queue_cached_before_event_had_uploads() {
        let (source, cache) = setup();
        assert!(cache.get_pending_queue("host", false).await.unwrap().is_empty());

        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("p", "evt", UploadStatus::Pending, 1));
        cache.invalidate("evt").await;

        assert_eq!(cache.get_pending_queue("host", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalidate_keeps_unrelated_owner_queues() {
        let (source, cache) = setup();
        source
            .owners
            .lock()
            .unwrap()
            .insert("other".to_string(), "guest".to_string());
        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("p", "evt", UploadStatus::Pending, 1));

        cache.get_pending_queue("host", false).await.unwrap();
        cache.get_pending_queue("guest", false).await.unwrap();
        let calls = source.calls();

        cache.invalidate("evt").await;
        cache.get_pending_queue("guest", false).await.unwrap();
        assert_eq!(source.calls(), calls);
        cache.get_pending_queue("host", false).await.unwrap();
        assert_eq!(source.calls(), calls + 1);
    }

    #[tokio::test]
    async fn owner_change_moves_pending_items() {
        let (source, cache) = setup();
        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("p", "evt", UploadStatus::Pending, 1));

        assert_eq!(cache.get_pending_queue("host", false).await.unwrap().len(), 1);
        assert!(cache.get_pending_queue("new-host", false).await.unwrap().is_empty());

        source
            .owners
            .lock()
            .unwrap()
            .insert("evt".to_string(), "new-host".to_string());
        cache.record_event_owner("evt", "new-host").await;

        assert!(cache.get_pending_queue("host", false).await.unwrap().is_empty());
        assert_eq!(cache.get_pending_queue("new-host", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refresh_reloads_event_list_and_stats() {
        let (source, cache) = setup();
        assert!(cache.get_event_uploads("evt", false).await.unwrap().is_empty());
        assert_eq!(cache.get_stats("evt", false).await.unwrap().approved_count, 0);

        source
            .uploads
            .lock()
            .unwrap()
            .push(upload("a", "evt", UploadStatus::Approved, 1));
        assert!(cache.get_event_uploads("evt", false).await.unwrap().is_empty());

        cache.refresh("evt").await.unwrap();
        let calls = source.calls();
        let list = cache.get_event_uploads("evt", false).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "a");
        assert_eq!(cache.get_stats("evt", false).await.unwrap().approved_count, 1);
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test]
    async fn reaction_counts_follow_toggles() {
        let (source, cache) = setup();
        source
            .reactions
            .lock()
            .unwrap()
            .insert("u".to_string(), BTreeMap::from([("heart".to_string(), 2)]));

        assert_eq!(cache.get_reaction_counts("u", false).await.unwrap()["heart"], 2);
        cache.record_reaction("u", "heart", 3).await;
        cache.record_reaction("u", "wow", 1).await;
        let counts = cache.get_reaction_counts("u", false).await.unwrap();
        assert_eq!(counts["heart"], 3);
        assert_eq!(counts["wow"], 1);

        cache.record_reaction("u", "wow", 0).await;
        assert!(!cache
            .get_reaction_counts("u", false)
            .await
            .unwrap()
            .contains_key("wow"));
        assert_eq!(source.calls(), 1);
    }
}

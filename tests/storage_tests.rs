use chrono::{Duration, Utc};
use event_photos::storage::models::{
    Event, GuardedWrite, ToggleAction, Upload, UploadStatus,
};
use event_photos::storage::{Database, DatabaseError};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_event(id: &str, owner_id: &str) -> Event {
    Event {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        max_photos: 100,
        allow_photo_upload: true,
        is_public: true,
        updated_at: Utc::now(),
    }
}

fn sample_upload(id: &str, event_id: &str, age_secs: i64) -> Upload {
    let at = Utc::now() - Duration::seconds(age_secs);
    Upload {
        id: id.to_string(),
        event_id: event_id.to_string(),
        image_ref: format!("{event_id}/{id}-1700000000000-abcdef123456.jpg"),
        mime_type: "image/jpeg".to_string(),
        byte_size: 2048,
        status: UploadStatus::Pending,
        created_at: at,
        updated_at: at,
        uploader_label: Some("Cousin Sam".to_string()),
        caption: None,
        approved_by: None,
    }
}

fn seeded_db() -> (tempfile::TempDir, Database) {
    let (dir, db) = test_db();
    db.put_event(&sample_event("evt-1", "host")).unwrap();
    (dir, db)
}

#[test]
fn test_insert_and_get_upload() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();

    let retrieved = db.get_upload("u1").unwrap().expect("upload should exist");
    assert_eq!(retrieved.event_id, "evt-1");
    assert_eq!(retrieved.status, UploadStatus::Pending);
    assert_eq!(retrieved.uploader_label.as_deref(), Some("Cousin Sam"));
    assert_eq!(retrieved.approved_by, None);
    assert_eq!(db.count_event_uploads("evt-1").unwrap(), 1);
}

#[test]
fn test_get_missing_upload() {
    let (_dir, db) = seeded_db();
    assert!(db.get_upload("nope").unwrap().is_none());
    assert!(db.get_upload_with_owner("nope").unwrap().is_none());
}

#[test]
fn test_insert_requires_registered_event() {
    let (_dir, db) = test_db();
    let err = db.insert_upload(&sample_upload("u1", "ghost", 0)).unwrap_err();
    assert!(matches!(err, DatabaseError::Constraint(_)));
    assert!(db.get_upload("u1").unwrap().is_none());
}

#[test]
fn test_insert_rejects_duplicate_id() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();
    let err = db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap_err();
    assert!(matches!(err, DatabaseError::Constraint(_)));
    assert_eq!(db.count_event_uploads("evt-1").unwrap(), 1);
}

#[test]
fn test_upload_with_owner() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();

    let (upload, owner) = db.get_upload_with_owner("u1").unwrap().unwrap();
    assert_eq!(upload.id, "u1");
    assert_eq!(owner, "host");
}

#[test]
fn test_approve_if_pending_applies_once() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();

    let first = db.approve_if_pending("u1", "host").unwrap();
    assert_eq!(first.rows_affected(), 1);
    let GuardedWrite::Applied(approved) = first else {
        panic!("expected the first approval to apply");
    };
    assert_eq!(approved.status, UploadStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("host"));

    let second = db.approve_if_pending("u1", "host").unwrap();
    assert_eq!(second.rows_affected(), 0);
    assert_eq!(second, GuardedWrite::Conflict(UploadStatus::Approved));

    assert_eq!(
        db.approve_if_pending("missing", "host").unwrap(),
        GuardedWrite::Missing
    );
}

#[test]
fn test_delete_if_pending() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();
    db.insert_upload(&sample_upload("u2", "evt-1", 0)).unwrap();
    db.approve_if_pending("u2", "host").unwrap();

    let deleted = db.delete_if_pending("u1").unwrap();
    assert!(matches!(deleted, GuardedWrite::Applied(ref u) if u.id == "u1"));
    assert!(db.get_upload("u1").unwrap().is_none());
    assert_eq!(db.count_event_uploads("evt-1").unwrap(), 1);

    // Approved rows are not deleted by the guarded write.
    assert_eq!(
        db.delete_if_pending("u2").unwrap(),
        GuardedWrite::Conflict(UploadStatus::Approved)
    );
    assert!(db.get_upload("u2").unwrap().is_some());

    assert_eq!(db.delete_if_pending("u1").unwrap(), GuardedWrite::Missing);
}

#[test]
fn test_list_event_uploads_by_status() {
    let (_dir, db) = seeded_db();
    db.put_event(&sample_event("evt-2", "host")).unwrap();
    db.insert_upload(&sample_upload("a", "evt-1", 30)).unwrap();
    db.insert_upload(&sample_upload("b", "evt-1", 20)).unwrap();
    db.insert_upload(&sample_upload("c", "evt-2", 10)).unwrap();
    db.approve_if_pending("b", "host").unwrap();

    let all = db.list_event_uploads("evt-1", None).unwrap();
    assert_eq!(
        all.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );

    let approved = db
        .list_event_uploads("evt-1", Some(UploadStatus::Approved))
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, "b");

    assert!(db.list_event_uploads("evt-3", None).unwrap().is_empty());
}

#[test]
fn test_pending_for_owner_spans_events_oldest_first() {
    let (_dir, db) = seeded_db();
    db.put_event(&sample_event("evt-2", "host")).unwrap();
    db.put_event(&sample_event("evt-3", "someone-else")).unwrap();
    db.insert_upload(&sample_upload("newer", "evt-1", 5)).unwrap();
    db.insert_upload(&sample_upload("older", "evt-2", 50)).unwrap();
    db.insert_upload(&sample_upload("foreign", "evt-3", 100)).unwrap();

    let pending = db.pending_for_owner("host").unwrap();
    assert_eq!(
        pending.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
        vec!["older", "newer"]
    );
}

#[test]
fn test_event_and_owner_stats() {
    let (_dir, db) = seeded_db();
    db.put_event(&sample_event("evt-2", "host")).unwrap();
    db.insert_upload(&sample_upload("a", "evt-1", 0)).unwrap();
    db.insert_upload(&sample_upload("b", "evt-1", 0)).unwrap();
    db.insert_upload(&sample_upload("c", "evt-2", 0)).unwrap();
    db.approve_if_pending("a", "host").unwrap();

    let stats = db.event_stats("evt-1").unwrap();
    assert_eq!(
        (stats.pending_count, stats.approved_count, stats.event_count),
        (1, 1, 1)
    );

    let stats = db.owner_stats("host").unwrap();
    assert_eq!(
        (stats.pending_count, stats.approved_count, stats.event_count),
        (2, 1, 2)
    );

    let stats = db.owner_stats("nobody").unwrap();
    assert_eq!(stats.event_count, 0);
}

#[test]
fn test_put_event_moves_owner_index() {
    let (_dir, db) = seeded_db();
    assert_eq!(db.events_by_owner("host").unwrap().len(), 1);

    let mut event = sample_event("evt-1", "new-host");
    event.is_public = false;
    db.put_event(&event).unwrap();

    assert!(db.events_by_owner("host").unwrap().is_empty());
    let owned = db.events_by_owner("new-host").unwrap();
    assert_eq!(owned.len(), 1);
    assert!(!owned[0].is_public);
    assert_eq!(db.get_event("evt-1").unwrap().unwrap().owner_id, "new-host");
}

#[test]
fn test_toggle_reaction_flips() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();
    db.approve_if_pending("u1", "host").unwrap();

    let added = db.toggle_reaction("u1", "anon:1.2.3.4", "heart").unwrap().unwrap();
    assert_eq!(added.action, ToggleAction::Added);
    assert_eq!(added.count, 1);
    assert!(added.has_reacted);

    db.toggle_reaction("u1", "user:bob", "heart").unwrap().unwrap();
    db.toggle_reaction("u1", "user:bob", "wow").unwrap().unwrap();
    assert_eq!(db.reaction_count("u1", "heart").unwrap(), 2);
    assert_eq!(db.reacted_types("u1", "user:bob").unwrap(), vec!["heart", "wow"]);

    let removed = db.toggle_reaction("u1", "anon:1.2.3.4", "heart").unwrap().unwrap();
    assert_eq!(removed.action, ToggleAction::Removed);
    assert_eq!(removed.count, 1);
    assert!(!removed.has_reacted);

    let counts = db.reaction_counts("u1").unwrap();
    assert_eq!(counts.get("heart"), Some(&1));
    assert_eq!(counts.get("wow"), Some(&1));
    assert_eq!(db.reaction_rows("u1").unwrap(), 2);
}

#[test]
fn test_toggle_reaction_needs_approved_upload() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();

    assert!(db.toggle_reaction("u1", "user:bob", "heart").unwrap().is_none());
    assert!(db.toggle_reaction("missing", "user:bob", "heart").unwrap().is_none());
    assert_eq!(db.reaction_rows("u1").unwrap(), 0);
}

#[test]
fn test_reactions_do_not_leak_between_uploads() {
    let (_dir, db) = seeded_db();
    for id in ["u1", "u10"] {
        db.insert_upload(&sample_upload(id, "evt-1", 0)).unwrap();
        db.approve_if_pending(id, "host").unwrap();
    }

    db.toggle_reaction("u10", "user:bob", "heart").unwrap();
    assert_eq!(db.reaction_rows("u1").unwrap(), 0);
    assert_eq!(db.reaction_rows("u10").unwrap(), 1);
}

#[test]
fn test_purge_all() {
    let (_dir, db) = seeded_db();
    db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();
    db.insert_upload(&sample_upload("u2", "evt-1", 0)).unwrap();
    db.approve_if_pending("u1", "host").unwrap();
    db.toggle_reaction("u1", "user:bob", "heart").unwrap();

    let stats = db.purge_all().unwrap();
    assert_eq!(stats.uploads, 2);
    assert_eq!(stats.events, 1);
    assert_eq!(stats.reactions, 1);

    assert!(db.get_upload("u1").unwrap().is_none());
    assert!(db.get_event("evt-1").unwrap().is_none());
    assert!(db.events_by_owner("host").unwrap().is_empty());
    assert_eq!(db.count_event_uploads("evt-1").unwrap(), 0);
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(dir.path().join("data")).unwrap();
        db.put_event(&sample_event("evt-1", "host")).unwrap();
        db.insert_upload(&sample_upload("u1", "evt-1", 0)).unwrap();
    }

    let db = Database::open(dir.path().join("data")).unwrap();
    assert!(db.get_upload("u1").unwrap().is_some());
    assert_eq!(db.pending_for_owner("host").unwrap().len(), 1);
}

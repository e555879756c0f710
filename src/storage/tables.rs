use redb::TableDefinition;

/// Upload records: uuid -> Upload (msgpack)
pub const UPLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("uploads");

/// Event index: event_id -> msgpack Vec of upload UUIDs, oldest first
pub const EVENT_UPLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("event_uploads");

/// Event records: event_id -> Event (msgpack)
pub const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("events");

/// Owner index: owner_id -> msgpack Vec of event ids
pub const OWNER_EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_events");

/// Reactions: "{upload_id}\x1f{actor_key}\x1f{reaction_type}" -> created_at (unix ms).
/// The key is the reaction's identity, so a duplicate row cannot exist.
pub const REACTIONS: TableDefinition<&str, i64> = TableDefinition::new("reactions");

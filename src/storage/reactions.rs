use std::collections::BTreeMap;

use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::{ToggleAction, ToggleOutcome, Upload, UploadStatus};
use super::tables::*;

/// Separates the parts of a reaction key. Actor keys and reaction types are
/// validated to never contain control characters.
const KEY_SEPARATOR: char = '\u{1f}';

fn reaction_key(upload_id: &str, actor_key: &str, reaction_type: &str) -> String {
    format!("{upload_id}{KEY_SEPARATOR}{actor_key}{KEY_SEPARATOR}{reaction_type}")
}

/// Half-open key range covering every reaction of one upload.
fn upload_range(upload_id: &str) -> (String, String) {
    // '\u{20}' is the character right after the separator.
    (
        format!("{upload_id}{KEY_SEPARATOR}"),
        format!("{upload_id}\u{20}"),
    )
}

/// Split a stored key into (actor_key, reaction_type).
fn split_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.splitn(3, KEY_SEPARATOR);
    let _upload_id = parts.next()?;
    let actor_key = parts.next()?;
    let reaction_type = parts.next()?;
    Some((actor_key, reaction_type))
}

fn count_of_type<T>(table: &T, upload_id: &str, reaction_type: &str) -> Result<u64, DatabaseError>
where
    T: ReadableTable<&'static str, i64>,
{
    let (start, end) = upload_range(upload_id);
    let mut count = 0;
    for entry in table.range(start.as_str()..end.as_str())? {
        let (key, _) = entry?;
        if split_key(key.value()).is_some_and(|(_, t)| t == reaction_type) {
            count += 1;
        }
    }
    Ok(count)
}

/// Remove every reaction of an upload inside an existing write transaction.
pub(super) fn remove_upload_reactions(
    write_txn: &WriteTransaction,
    upload_id: &str,
) -> Result<u64, DatabaseError> {
    let mut table = write_txn.open_table(REACTIONS)?;
    let (start, end) = upload_range(upload_id);
    let keys: Vec<String> = table
        .range(start.as_str()..end.as_str())?
        .map(|r| r.map(|(k, _)| k.value().to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    for key in &keys {
        table.remove(key.as_str())?;
    }
    Ok(keys.len() as u64)
}

impl Database {
    // ========================================================================
    // Reaction operations
    // ========================================================================

    /// Flip the reaction row for (upload, actor, type) and recount, all in one
    /// write transaction. Returns `None` when the upload does not exist or is
    /// not approved.
    pub fn toggle_reaction(
        &self,
        upload_id: &str,
        actor_key: &str,
        reaction_type: &str,
    ) -> Result<Option<ToggleOutcome>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let outcome = {
            let uploads = write_txn.open_table(UPLOADS)?;
            let visible = match uploads.get(upload_id)? {
                Some(data) => {
                    let upload: Upload = rmp_serde::from_slice(data.value())?;
                    upload.status == UploadStatus::Approved
                }
                None => false,
            };
            if !visible {
                None
            } else {
                let mut table = write_txn.open_table(REACTIONS)?;
                let key = reaction_key(upload_id, actor_key, reaction_type);
                let action = if table.remove(key.as_str())?.is_some() {
                    ToggleAction::Removed
                } else {
                    table.insert(key.as_str(), chrono::Utc::now().timestamp_millis())?;
                    ToggleAction::Added
                };
                let count = count_of_type(&table, upload_id, reaction_type)?;
                Some(ToggleOutcome {
                    action,
                    count,
                    has_reacted: action == ToggleAction::Added,
                })
            }
        };

        match outcome {
            Some(_) => write_txn.commit()?,
            None => write_txn.abort()?,
        }
        Ok(outcome)
    }

    /// Count of one reaction type on an upload
    pub fn reaction_count(&self, upload_id: &str, reaction_type: &str) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(REACTIONS)?;
        count_of_type(&table, upload_id, reaction_type)
    }

    /// Counts of every reaction type present on an upload
    pub fn reaction_counts(&self, upload_id: &str) -> Result<BTreeMap<String, u64>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(REACTIONS)?;
        let (start, end) = upload_range(upload_id);

        let mut counts = BTreeMap::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (key, _) = entry?;
            if let Some((_, reaction_type)) = split_key(key.value()) {
                *counts.entry(reaction_type.to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Reaction types the actor currently holds on an upload
    pub fn reacted_types(&self, upload_id: &str, actor_key: &str) -> Result<Vec<String>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(REACTIONS)?;
        let (start, end) = upload_range(upload_id);

        let mut types = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (key, _) = entry?;
            if let Some((actor, reaction_type)) = split_key(key.value()) {
                if actor == actor_key {
                    types.push(reaction_type.to_string());
                }
            }
        }
        Ok(types)
    }

    /// Number of reaction rows stored for an upload, across all actors and types
    pub fn reaction_rows(&self, upload_id: &str) -> Result<u64, DatabaseError> {
        Ok(self.reaction_counts(upload_id)?.values().sum())
    }
}

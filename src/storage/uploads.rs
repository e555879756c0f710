use chrono::Utc;
use redb::ReadableTable;

use super::db::{read_id_list, write_id_list, Database, DatabaseError};
use super::models::{Event, GuardedWrite, ModerationStats, Upload, UploadStatus};
use super::reactions::remove_upload_reactions;
use super::tables::*;

impl Database {
    // ========================================================================
    // Upload operations
    // ========================================================================

    /// Insert a new upload row and append it to its event index.
    ///
    /// Fails with `DatabaseError::Constraint` when the event is not registered
    /// or the id is already taken.
    pub fn insert_upload(&self, upload: &Upload) -> Result<(), DatabaseError> {
        debug_assert!(!upload.id.is_empty(), "upload id must not be empty");
        debug_assert_eq!(upload.status, UploadStatus::Pending);

        let write_txn = self.begin_write()?;
        {
            let events = write_txn.open_table(EVENTS)?;
            if events.get(upload.event_id.as_str())?.is_none() {
                return Err(DatabaseError::Constraint(format!(
                    "upload references unknown event '{}'",
                    upload.event_id
                )));
            }

            let mut table = write_txn.open_table(UPLOADS)?;
            if table.get(upload.id.as_str())?.is_some() {
                return Err(DatabaseError::Constraint(format!(
                    "upload id '{}' already exists",
                    upload.id
                )));
            }
            let data = rmp_serde::to_vec_named(upload)?;
            table.insert(upload.id.as_str(), data.as_slice())?;

            let mut index = write_txn.open_table(EVENT_UPLOADS)?;
            let mut ids = read_id_list(&index, &upload.event_id)?;
            ids.push(upload.id.clone());
            write_id_list(&mut index, &upload.event_id, &ids)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get an upload by its UUID
    pub fn get_upload(&self, id: &str) -> Result<Option<Upload>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UPLOADS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get an upload together with the owner of its event, read in one snapshot.
    pub fn get_upload_with_owner(
        &self,
        id: &str,
    ) -> Result<Option<(Upload, String)>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let uploads = read_txn.open_table(UPLOADS)?;
        let events = read_txn.open_table(EVENTS)?;

        let upload: Upload = match uploads.get(id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(None),
        };

        let owner_id = match events.get(upload.event_id.as_str())? {
            Some(data) => {
                let event: Event = rmp_serde::from_slice(data.value())?;
                event.owner_id
            }
            None => return Ok(None),
        };

        Ok(Some((upload, owner_id)))
    }

    /// Set `status = approved` only if the row is still pending.
    pub fn approve_if_pending(
        &self,
        id: &str,
        actor_id: &str,
    ) -> Result<GuardedWrite, DatabaseError> {
        let write_txn = self.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(UPLOADS)?;
            let existing: Option<Upload> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match existing {
                None => GuardedWrite::Missing,
                Some(upload) if upload.status != UploadStatus::Pending => {
                    GuardedWrite::Conflict(upload.status)
                }
                Some(mut upload) => {
                    upload.status = UploadStatus::Approved;
                    upload.approved_by = Some(actor_id.to_string());
                    upload.updated_at = Utc::now();

                    let data = rmp_serde::to_vec_named(&upload)?;
                    table.insert(id, data.as_slice())?;
                    GuardedWrite::Applied(upload)
                }
            }
        };

        if outcome.rows_affected() == 0 {
            write_txn.abort()?;
        } else {
            write_txn.commit()?;
        }
        Ok(outcome)
    }

    /// Delete the row (plus its index entry and reactions) only if it is still
    /// pending. The applied value is the row as it was before deletion.
    pub fn delete_if_pending(&self, id: &str) -> Result<GuardedWrite, DatabaseError> {
        let write_txn = self.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(UPLOADS)?;
            let existing: Option<Upload> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match existing {
                None => GuardedWrite::Missing,
                Some(upload) if upload.status != UploadStatus::Pending => {
                    GuardedWrite::Conflict(upload.status)
                }
                Some(upload) => {
                    table.remove(id)?;

                    let mut index = write_txn.open_table(EVENT_UPLOADS)?;
                    let mut ids = read_id_list(&index, &upload.event_id)?;
                    ids.retain(|uid| uid != id);
                    write_id_list(&mut index, &upload.event_id, &ids)?;

                    remove_upload_reactions(&write_txn, id)?;
                    GuardedWrite::Applied(upload)
                }
            }
        };

        if outcome.rows_affected() == 0 {
            write_txn.abort()?;
        } else {
            write_txn.commit()?;
        }
        Ok(outcome)
    }

    /// List an event's uploads in submission order, optionally by status.
    pub fn list_event_uploads(
        &self,
        event_id: &str,
        status: Option<UploadStatus>,
    ) -> Result<Vec<Upload>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(EVENT_UPLOADS)?;
        let table = read_txn.open_table(UPLOADS)?;

        let mut uploads = Vec::new();
        for upload_id in read_id_list(&index, event_id)? {
            if let Some(data) = table.get(upload_id.as_str())? {
                let upload: Upload = rmp_serde::from_slice(data.value())?;
                if status.map_or(true, |s| upload.status == s) {
                    uploads.push(upload);
                }
            }
        }

        Ok(uploads)
    }

    /// Number of live (pending or approved) uploads for an event
    pub fn count_event_uploads(&self, event_id: &str) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(EVENT_UPLOADS)?;
        Ok(read_id_list(&index, event_id)?.len() as u64)
    }

    /// Pending uploads across every event the owner holds, oldest first.
    pub fn pending_for_owner(&self, owner_id: &str) -> Result<Vec<Upload>, DatabaseError> {
        let mut pending = Vec::new();
        for event in self.events_by_owner(owner_id)? {
            pending.extend(self.list_event_uploads(&event.id, Some(UploadStatus::Pending))?);
        }
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    /// Stats for one event. `event_count` is 1 when the event is registered.
    pub fn event_stats(&self, event_id: &str) -> Result<ModerationStats, DatabaseError> {
        let mut stats = ModerationStats {
            event_count: u64::from(self.get_event(event_id)?.is_some()),
            ..Default::default()
        };
        for upload in self.list_event_uploads(event_id, None)? {
            match upload.status {
                UploadStatus::Pending => stats.pending_count += 1,
                UploadStatus::Approved => stats.approved_count += 1,
                UploadStatus::Rejected => {}
            }
        }
        Ok(stats)
    }

    /// Stats across all of an owner's events.
    pub fn owner_stats(&self, owner_id: &str) -> Result<ModerationStats, DatabaseError> {
        let mut total = ModerationStats::default();
        for event in self.events_by_owner(owner_id)? {
            let stats = self.event_stats(&event.id)?;
            total.pending_count += stats.pending_count;
            total.approved_count += stats.approved_count;
            total.event_count += 1;
        }
        Ok(total)
    }
}

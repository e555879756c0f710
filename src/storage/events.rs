use redb::ReadableTable;

use super::db::{read_id_list, write_id_list, Database, DatabaseError};
use super::models::Event;
use super::tables::*;

impl Database {
    // ========================================================================
    // Event operations
    // ========================================================================

    /// Insert or replace an event and keep the owner index in step.
    pub fn put_event(&self, event: &Event) -> Result<(), DatabaseError> {
        debug_assert!(!event.id.is_empty(), "event id must not be empty");
        debug_assert!(!event.owner_id.is_empty(), "event owner must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(EVENTS)?;
            let previous_owner: Option<String> = match table.get(event.id.as_str())? {
                Some(data) => {
                    let existing: Event = rmp_serde::from_slice(data.value())?;
                    Some(existing.owner_id)
                }
                None => None,
            };

            let data = rmp_serde::to_vec_named(event)?;
            table.insert(event.id.as_str(), data.as_slice())?;

            let mut owners = write_txn.open_table(OWNER_EVENTS)?;
            if let Some(ref old_owner) = previous_owner {
                if old_owner != &event.owner_id {
                    let mut ids = read_id_list(&owners, old_owner)?;
                    ids.retain(|eid| eid != &event.id);
                    write_id_list(&mut owners, old_owner, &ids)?;
                }
            }

            let mut ids = read_id_list(&owners, &event.owner_id)?;
            if !ids.contains(&event.id) {
                ids.push(event.id.clone());
                write_id_list(&mut owners, &event.owner_id, &ids)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get an event by id
    pub fn get_event(&self, id: &str) -> Result<Option<Event>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(EVENTS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// All events owned by an actor, in registration order
    pub fn events_by_owner(&self, owner_id: &str) -> Result<Vec<Event>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owners = read_txn.open_table(OWNER_EVENTS)?;
        let table = read_txn.open_table(EVENTS)?;

        let mut events = Vec::new();
        for event_id in read_id_list(&owners, owner_id)? {
            if let Some(data) = table.get(event_id.as_str())? {
                events.push(rmp_serde::from_slice(data.value())?);
            }
        }
        Ok(events)
    }
}

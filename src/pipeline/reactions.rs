use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::Serialize;

use super::{PipelineError, ValidationError};
use crate::cache::UploadCache;
use crate::storage::models::{ToggleOutcome, UploadStatus};
use crate::storage::Database;

const MAX_REACTION_TYPE_LEN: usize = 32;

/// Who a reaction belongs to. Anonymous keys come from a best-effort client
/// IP lookup and are not a strong identity: guests behind one NAT share a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorKey {
    User(String),
    Anonymous(IpAddr),
}

impl ActorKey {
    /// Storage form: `user:{id}` or `anon:{ip}`.
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ActorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorKey::User(id) => write!(f, "user:{id}"),
            ActorKey::Anonymous(ip) => write!(f, "anon:{ip}"),
        }
    }
}

pub fn validate_reaction_type(reaction_type: &str) -> Result<&str, ValidationError> {
    let valid = !reaction_type.is_empty()
        && reaction_type.len() <= MAX_REACTION_TYPE_LEN
        && reaction_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(reaction_type)
    } else {
        Err(ValidationError::InvalidReactionType)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionSummary {
    pub counts: BTreeMap<String, u64>,
    /// Types the requesting actor has reacted with
    pub reacted: Vec<String>,
}

#[derive(Clone)]
pub struct ReactionService {
    db: Database,
}

impl ReactionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add the reaction if absent, remove it if present. Toggling twice
    /// restores the previous state.
    pub fn toggle(
        &self,
        upload_id: &str,
        actor: &ActorKey,
        reaction_type: &str,
    ) -> Result<ToggleOutcome, PipelineError> {
        let reaction_type = validate_reaction_type(reaction_type)?;
        let actor_key = actor.as_key();
        if actor_key.chars().any(char::is_control) {
            return Err(ValidationError::InvalidActorKey.into());
        }

        let outcome = self
            .db
            .toggle_reaction(upload_id, &actor_key, reaction_type)?
            .ok_or_else(|| PipelineError::NotFound(format!("upload '{upload_id}'")))?;

        tracing::debug!(
            upload_id = %upload_id,
            actor = %actor_key,
            reaction = %reaction_type,
            action = ?outcome.action,
            count = outcome.count,
            "Toggled reaction"
        );
        Ok(outcome)
    }

    /// Reactions are only visible on approved uploads.
    fn ensure_visible(&self, upload_id: &str) -> Result<(), PipelineError> {
        let visible = self
            .db
            .get_upload(upload_id)?
            .is_some_and(|u| u.status == UploadStatus::Approved);
        if !visible {
            return Err(PipelineError::NotFound(format!("upload '{upload_id}'")));
        }
        Ok(())
    }

    /// Types `actor` has reacted with on an upload.
    fn reacted_types(
        &self,
        upload_id: &str,
        actor: Option<&ActorKey>,
    ) -> Result<Vec<String>, PipelineError> {
        match actor {
            Some(actor) => Ok(self.db.reacted_types(upload_id, &actor.as_key())?),
            None => Ok(Vec::new()),
        }
    }

    /// Counts come from `cache`, the caller's own reactions from the store.
    pub async fn summary(
        &self,
        upload_id: &str,
        actor: Option<&ActorKey>,
        cache: &UploadCache,
        force_refresh: bool,
    ) -> Result<ReactionSummary, PipelineError> {
        self.ensure_visible(upload_id)?;
        let counts = cache.get_reaction_counts(upload_id, force_refresh).await?;
        let reacted = self.reacted_types(upload_id, actor)?;
        Ok(ReactionSummary { counts, reacted })
    }
}

//! Reaction (like edge) domain model.
//!
//! # Invariants
//! - `actor_id` and `target_id` are never nil.
//! - At most one active reaction exists per `(actor_id, target_id)`; older
//!   soft-deleted rows for the same pair may coexist.

use super::{require_identity, TargetId, UserId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one reaction row.
pub type ReactionId = Uuid;

/// Like from an actor to a target post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub actor_id: UserId,
    pub target_id: TargetId,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Reaction {
    /// Creates an active reaction with a fresh id at the current UTC instant.
    pub fn new(actor_id: UserId, target_id: TargetId) -> Self {
        Self::at(actor_id, target_id, Utc::now())
    }

    pub fn at(actor_id: UserId, target_id: TargetId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            target_id,
            created_at,
            deleted_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_identity(self.id, "reaction id")?;
        require_identity(self.actor_id, "actor_id")?;
        require_identity(self.target_id, "target_id")?;
        if let Some(deleted_at) = self.deleted_at {
            if deleted_at < self.created_at {
                return Err(ValidationError::DeletedBeforeCreated);
            }
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::Reaction;
    use crate::model::ValidationError;
    use uuid::Uuid;

    #[test]
    fn nil_target_is_rejected() {
        let reaction = Reaction::new(Uuid::new_v4(), Uuid::nil());
        assert_eq!(
            reaction.validate(),
            Err(ValidationError::NilIdentity { field: "target_id" })
        );
    }

    #[test]
    fn serializes_tombstone_as_null_when_active() {
        let reaction = Reaction::new(Uuid::new_v4(), Uuid::new_v4());
        let json = serde_json::to_value(&reaction).unwrap();
        assert!(json.as_object().unwrap().contains_key("deleted_at"));
        assert!(json["deleted_at"].is_null());
        assert!(reaction.is_active());
    }
}

//! Relationship (follow edge) domain model.
//!
//! # Responsibility
//! - Define the canonical directed follow edge between two users.
//! - Provide construction and validation helpers used before persistence.
//!
//! # Invariants
//! - `follower_id != followee_id`, and neither is nil.
//! - At most one active edge exists per `(follower_id, followee_id)`; the
//!   store enforces this, not the model.
//! - `deleted_at` is `None` for active edges.

use super::{require_identity, UserId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one relationship row.
pub type RelationshipId = Uuid;

/// Directed follow edge from `follower_id` to `followee_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    /// Who follows.
    pub follower_id: UserId,
    /// Whom they follow.
    pub followee_id: UserId,
    /// Reserved for private accounts; follows created here are pre-approved.
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    /// Soft delete tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Relationship {
    /// Creates an approved, active edge with a fresh id stamped at the
    /// current UTC instant.
    pub fn new(follower_id: UserId, followee_id: UserId) -> Self {
        Self::at(follower_id, followee_id, Utc::now())
    }

    /// Creates an approved, active edge stamped at `created_at`.
    pub fn at(follower_id: UserId, followee_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            follower_id,
            followee_id,
            approved: true,
            created_at,
            deleted_at: None,
        }
    }

    /// Checks identity invariants before any store mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_pair(self.follower_id, self.followee_id)?;
        require_identity(self.id, "relationship id")?;
        if let Some(deleted_at) = self.deleted_at {
            if deleted_at < self.created_at {
                return Err(ValidationError::DeletedBeforeCreated);
            }
        }
        Ok(())
    }

    /// Returns whether this edge is live (not soft-deleted).
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Validates a `(follower, followee)` pair used as a relationship key.
pub fn validate_pair(follower_id: UserId, followee_id: UserId) -> Result<(), ValidationError> {
    require_identity(follower_id, "follower_id")?;
    require_identity(followee_id, "followee_id")?;
    if follower_id == followee_id {
        return Err(ValidationError::SelfRelationship(follower_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_pair, Relationship};
    use crate::model::ValidationError;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn new_relationship_is_active_and_approved() {
        let edge = Relationship::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(edge.is_active());
        assert!(edge.approved);
        assert!(!edge.id.is_nil());
        edge.validate().unwrap();
    }

    #[test]
    fn self_follow_is_rejected() {
        let user = Uuid::new_v4();
        assert_eq!(
            validate_pair(user, user),
            Err(ValidationError::SelfRelationship(user))
        );
    }

    #[test]
    fn nil_participants_are_rejected() {
        let err = validate_pair(Uuid::nil(), Uuid::new_v4()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NilIdentity {
                field: "follower_id"
            }
        );
        let err = validate_pair(Uuid::new_v4(), Uuid::nil()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NilIdentity {
                field: "followee_id"
            }
        );
    }

    #[test]
    fn tombstone_before_creation_is_invalid() {
        let mut edge = Relationship::new(Uuid::new_v4(), Uuid::new_v4());
        edge.deleted_at = Some(edge.created_at - Duration::seconds(1));
        assert_eq!(edge.validate(), Err(ValidationError::DeletedBeforeCreated));
    }

    #[test]
    fn serializes_live_tombstone_as_explicit_null() {
        let edge = Relationship::new(Uuid::new_v4(), Uuid::new_v4());
        let json = serde_json::to_value(&edge).unwrap();
        assert!(json.as_object().unwrap().contains_key("deleted_at"));
        assert!(json["deleted_at"].is_null());
    }
}

//! Engagement domain model.
//!
//! # Responsibility
//! - Define the relationship (follow edge) and reaction (like edge) records.
//! - Keep identity and liveness rules in one place for stores and services.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - `deleted_at` absence is the only liveness discriminator.
//! - Nil UUIDs are never valid participant identities.

pub mod reaction;
pub mod relationship;

use thiserror::Error;
use uuid::Uuid;

/// Identity of an authenticated user (follower, followee, reaction actor).
pub type UserId = Uuid;

/// Identity of a reaction target (a post).
pub type TargetId = Uuid;

/// Validation failures shared by relationship and reaction records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A participant identity is the nil UUID.
    #[error("{field} must not be nil")]
    NilIdentity { field: &'static str },
    /// A relationship points back at its own follower.
    #[error("user {0} cannot follow themselves")]
    SelfRelationship(UserId),
    /// A soft-delete timestamp precedes the creation timestamp.
    #[error("deleted_at must not be earlier than created_at")]
    DeletedBeforeCreated,
}

pub(crate) fn require_identity(id: Uuid, field: &'static str) -> Result<(), ValidationError> {
    if id.is_nil() {
        return Err(ValidationError::NilIdentity { field });
    }
    Ok(())
}

//! Engine-boundary error taxonomy.
//!
//! # Responsibility
//! - Classify store failures into the small set of outcomes callers act on.
//! - Keep raw driver errors behind `Internal` as a source, never as a kind.
//!
//! # Invariants
//! - Every `EngagementError` maps to exactly one `ErrorKind`.
//! - Publish failures never appear here.

use crate::model::ValidationError;
use crate::repo::StoreError;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

pub type EngagementResult<T> = Result<T, EngagementError>;

/// Classified failure returned by the subscription, reaction and query
/// engines.
#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("user {follower_id} already follows {followee_id}")]
    AlreadyFollowing { follower_id: Uuid, followee_id: Uuid },
    #[error("actor {actor_id} already reacted to {target_id}")]
    DuplicateReaction { actor_id: Uuid, target_id: Uuid },
    #[error("{operation} timed out after {budget_ms}ms")]
    Timeout {
        operation: &'static str,
        budget_ms: u64,
    },
    #[error("{operation} failed")]
    Internal {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Response signal a boundary layer derives from an `EngagementError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name used in logs and machine-readable output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngagementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyFollowing { .. } | Self::DuplicateReaction { .. } => ErrorKind::Conflict,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Classifies a store failure raised while running `operation`.
    pub(crate) fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::InvalidArgument(message) => Self::InvalidArgument(message),
            StoreError::NotFound { entity } => Self::NotFound { entity },
            StoreError::DuplicateRelationship {
                follower_id,
                followee_id,
            } => Self::AlreadyFollowing {
                follower_id,
                followee_id,
            },
            StoreError::DuplicateReaction {
                actor_id,
                target_id,
            } => Self::DuplicateReaction {
                actor_id,
                target_id,
            },
            StoreError::Timeout { budget_ms, .. } => Self::Timeout {
                operation,
                budget_ms,
            },
            source @ (StoreError::InvalidData(_) | StoreError::Db { .. }) => Self::Internal {
                operation,
                source,
            },
        }
    }
}

impl From<ValidationError> for EngagementError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

/// Renders `err` followed by each of its sources, `: `-separated.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::{EngagementError, ErrorKind};
    use crate::db::DbError;
    use crate::model::ValidationError;
    use crate::repo::StoreError;
    use uuid::Uuid;

    #[test]
    fn validation_failures_are_invalid_arguments() {
        let user = Uuid::new_v4();
        let err = EngagementError::from(ValidationError::SelfRelationship(user));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("cannot follow themselves"));
    }

    #[test]
    fn duplicate_relationship_surfaces_as_already_following() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let err = EngagementError::from_store(
            "subscription.follow",
            StoreError::DuplicateRelationship {
                follower_id: a,
                followee_id: b,
            },
        );
        assert!(matches!(
            err,
            EngagementError::AlreadyFollowing { follower_id, followee_id }
                if follower_id == a && followee_id == b
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn driver_failures_are_internal_with_source() {
        let err = EngagementError::from_store(
            "reaction.like",
            StoreError::Db {
                operation: "reaction.create",
                source: DbError::InvalidPoolSize(0),
            },
        );
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "reaction.like failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn kinds_have_stable_names() {
        assert_eq!(ErrorKind::InvalidArgument.as_str(), "invalid_argument");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::Timeout.as_str(), "timeout");
    }
}

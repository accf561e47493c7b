//! Like/unlike use cases.
//!
//! # Invariants
//! - Deletes are scoped to the owning actor by the store; a foreign actor
//!   observes `NotFound`.
//! - Reactions emit no events.

use crate::error::EngagementResult;
use crate::model::reaction::{Reaction, ReactionId};
use crate::model::{require_identity, TargetId, UserId};
use crate::repo::now_millis;
use crate::repo::reaction_repo::ReactionStore;
use crate::service::{engine_error, EngineOptions};
use chrono::{DateTime, Utc};
use log::info;

/// Use-case service for like edges.
pub struct ReactionService<S: ReactionStore> {
    store: S,
    options: EngineOptions,
}

impl<S: ReactionStore> ReactionService<S> {
    pub fn new(store: S, options: EngineOptions) -> Self {
        Self { store, options }
    }

    /// Records a like from `actor_id` on `target_id`.
    ///
    /// # Contract
    /// - Nil ids -> `InvalidArgument`.
    /// - A live like for the pair -> `DuplicateReaction`.
    pub fn like(&self, actor_id: UserId, target_id: TargetId) -> EngagementResult<Reaction> {
        require_identity(actor_id, "actor_id")?;
        require_identity(target_id, "target_id")?;

        let reaction = Reaction::at(actor_id, target_id, now_millis());
        let stored = self
            .store
            .create(self.options.deadline(), &reaction)
            .map_err(|err| engine_error("reaction.like", err))?;

        info!(
            "event=reaction_like module=service status=ok id={} actor_id={} target_id={}",
            stored.id, actor_id, target_id
        );
        Ok(stored)
    }

    /// Soft-deletes a like owned by `actor_id` and returns the deletion
    /// instant.
    pub fn unlike(
        &self,
        reaction_id: ReactionId,
        actor_id: UserId,
    ) -> EngagementResult<DateTime<Utc>> {
        require_identity(reaction_id, "reaction id")?;
        require_identity(actor_id, "actor_id")?;

        let deleted_at = self
            .store
            .soft_delete(self.options.deadline(), reaction_id, actor_id)
            .map_err(|err| engine_error("reaction.unlike", err))?;

        info!(
            "event=reaction_unlike module=service status=ok id={} actor_id={}",
            reaction_id, actor_id
        );
        Ok(deleted_at)
    }

    /// Physically removes a like owned by `actor_id`.
    pub fn purge_reaction(&self, reaction_id: ReactionId, actor_id: UserId) -> EngagementResult<()> {
        require_identity(reaction_id, "reaction id")?;
        require_identity(actor_id, "actor_id")?;
        self.store
            .hard_delete(self.options.deadline(), reaction_id, actor_id)
            .map_err(|err| engine_error("reaction.purge_reaction", err))
    }
}

#[cfg(test)]
mod tests {
    use super::ReactionService;
    use crate::db::ConnectionPool;
    use crate::error::{EngagementError, ErrorKind};
    use crate::repo::reaction_repo::SqliteReactionStore;
    use crate::service::EngineOptions;
    use std::sync::Arc;
    use uuid::Uuid;

    fn service() -> ReactionService<SqliteReactionStore> {
        let pool = Arc::new(ConnectionPool::open_in_memory().unwrap());
        ReactionService::new(SqliteReactionStore::new(pool), EngineOptions::default())
    }

    #[test]
    fn nil_ids_are_invalid() {
        let service = service();
        let err = service.like(Uuid::nil(), Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = service.unlike(Uuid::new_v4(), Uuid::nil()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn relike_after_unlike_gets_a_new_id() {
        let service = service();
        let (actor, target) = (Uuid::new_v4(), Uuid::new_v4());
        let first = service.like(actor, target).unwrap();
        service.unlike(first.id, actor).unwrap();
        let second = service.like(actor, target).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn purge_is_ownership_scoped() {
        let service = service();
        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());
        let reaction = service.like(owner, Uuid::new_v4()).unwrap();
        assert!(matches!(
            service.purge_reaction(reaction.id, other),
            Err(EngagementError::NotFound { .. })
        ));
        service.purge_reaction(reaction.id, owner).unwrap();
    }
}

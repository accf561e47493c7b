//! Read-only facade over both stores.

use crate::error::EngagementResult;
use crate::model::reaction::{Reaction, ReactionId};
use crate::model::relationship::Relationship;
use crate::model::{TargetId, UserId};
use crate::repo::reaction_repo::ReactionStore;
use crate::repo::relationship_repo::RelationshipStore;
use crate::service::{engine_error, EngineOptions};
use serde::Serialize;

/// Live follower and following totals of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

/// Pagination and count queries over relationships and reactions.
pub struct EngagementQueries<R: RelationshipStore, L: ReactionStore> {
    relationships: R,
    reactions: L,
    options: EngineOptions,
}

impl<R: RelationshipStore, L: ReactionStore> EngagementQueries<R, L> {
    pub fn new(relationships: R, reactions: L, options: EngineOptions) -> Self {
        Self {
            relationships,
            reactions,
            options,
        }
    }

    pub fn is_following(&self, follower_id: UserId, followee_id: UserId) -> EngagementResult<bool> {
        self.relationships
            .is_active(self.options.deadline(), follower_id, followee_id)
            .map_err(|err| engine_error("query.is_following", err))
    }

    /// Live edges pointing at `user_id`, newest first. Empty when none.
    pub fn followers(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> EngagementResult<Vec<Relationship>> {
        self.relationships
            .list_followers(self.options.deadline(), user_id, limit, offset)
            .map_err(|err| engine_error("query.followers", err))
    }

    /// Live edges starting at `user_id`, newest first. Empty when none.
    pub fn following(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> EngagementResult<Vec<Relationship>> {
        self.relationships
            .list_following(self.options.deadline(), user_id, limit, offset)
            .map_err(|err| engine_error("query.following", err))
    }

    pub fn follow_counts(&self, user_id: UserId) -> EngagementResult<FollowCounts> {
        let followers = self
            .relationships
            .count_followers(self.options.deadline(), user_id)
            .map_err(|err| engine_error("query.follow_counts", err))?;
        let following = self
            .relationships
            .count_following(self.options.deadline(), user_id)
            .map_err(|err| engine_error("query.follow_counts", err))?;
        Ok(FollowCounts {
            followers,
            following,
        })
    }

    pub fn reaction(&self, reaction_id: ReactionId) -> EngagementResult<Reaction> {
        self.reactions
            .get_by_id(self.options.deadline(), reaction_id)
            .map_err(|err| engine_error("query.reaction", err))
    }

    /// Live reactions by `actor_id`; `NotFound` when there are none.
    pub fn reactions_by_actor(
        &self,
        actor_id: UserId,
        limit: i64,
        offset: i64,
    ) -> EngagementResult<Vec<Reaction>> {
        self.reactions
            .list_by_actor(self.options.deadline(), actor_id, limit, offset)
            .map_err(|err| engine_error("query.reactions_by_actor", err))
    }

    /// Live reactions on `target_id`; `NotFound` when there are none.
    pub fn reactions_by_target(
        &self,
        target_id: TargetId,
        limit: i64,
        offset: i64,
    ) -> EngagementResult<Vec<Reaction>> {
        self.reactions
            .list_by_target(self.options.deadline(), target_id, limit, offset)
            .map_err(|err| engine_error("query.reactions_by_target", err))
    }

    pub fn reaction_count(&self, target_id: TargetId) -> EngagementResult<u64> {
        self.reactions
            .count_by_target(self.options.deadline(), target_id)
            .map_err(|err| engine_error("query.reaction_count", err))
    }
}

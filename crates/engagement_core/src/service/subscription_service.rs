//! Follow/unfollow use cases.
//!
//! # Responsibility
//! - Validate follow requests and persist them through the relationship store.
//! - Schedule `subscription.created` / `subscription.deleted` after commit.
//!
//! # Invariants
//! - A self-follow or nil identity never reaches the store.
//! - The event is submitted only after the store call returned `Ok`; a
//!   failed or dropped publish never changes the result of the call.
//! - Reads delegate to the store without extra logic.

use crate::error::EngagementResult;
use crate::event::{EngagementEvent, EventDispatcher};
use crate::model::relationship::{validate_pair, Relationship};
use crate::model::{require_identity, UserId};
use crate::repo::now_millis;
use crate::repo::relationship_repo::RelationshipStore;
use crate::service::{engine_error, EngineOptions};
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;

/// Use-case service for directed follow edges.
pub struct SubscriptionService<S: RelationshipStore> {
    store: S,
    dispatcher: Arc<EventDispatcher>,
    options: EngineOptions,
}

impl<S: RelationshipStore> SubscriptionService<S> {
    pub fn new(store: S, dispatcher: Arc<EventDispatcher>, options: EngineOptions) -> Self {
        Self {
            store,
            dispatcher,
            options,
        }
    }

    /// Makes `follower_id` follow `followee_id`.
    ///
    /// # Contract
    /// - Nil ids or `follower_id == followee_id` -> `InvalidArgument`.
    /// - A live edge for the pair -> `AlreadyFollowing`.
    /// - On success a `subscription.created` event is queued; its outcome is
    ///   never reported to the caller.
    pub fn follow(&self, follower_id: UserId, followee_id: UserId) -> EngagementResult<Relationship> {
        validate_pair(follower_id, followee_id)?;

        let edge = Relationship::at(follower_id, followee_id, now_millis());
        let stored = self
            .store
            .create(self.options.deadline(), &edge)
            .map_err(|err| engine_error("subscription.follow", err))?;

        info!(
            "event=subscription_follow module=service status=ok follower_id={} followee_id={}",
            follower_id, followee_id
        );
        self.dispatcher.submit(EngagementEvent::subscription_created(
            stored.follower_id,
            stored.followee_id,
            stored.created_at,
        ));
        Ok(stored)
    }

    /// Soft-deletes the live edge and returns the deletion instant.
    ///
    /// # Contract
    /// - No live edge -> `NotFound`, and no event is queued.
    /// - On success a `subscription.deleted` event is queued.
    pub fn unfollow(
        &self,
        follower_id: UserId,
        followee_id: UserId,
    ) -> EngagementResult<DateTime<Utc>> {
        validate_pair(follower_id, followee_id)?;

        let deleted_at = self
            .store
            .soft_delete(self.options.deadline(), follower_id, followee_id)
            .map_err(|err| engine_error("subscription.unfollow", err))?;

        info!(
            "event=subscription_unfollow module=service status=ok follower_id={} followee_id={}",
            follower_id, followee_id
        );
        self.dispatcher.submit(EngagementEvent::subscription_deleted(
            follower_id,
            followee_id,
            deleted_at,
        ));
        Ok(deleted_at)
    }

    pub fn is_following(&self, follower_id: UserId, followee_id: UserId) -> EngagementResult<bool> {
        self.store
            .is_active(self.options.deadline(), follower_id, followee_id)
            .map_err(|err| engine_error("subscription.is_following", err))
    }

    pub fn get_followers(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> EngagementResult<Vec<Relationship>> {
        self.store
            .list_followers(self.options.deadline(), user_id, limit, offset)
            .map_err(|err| engine_error("subscription.get_followers", err))
    }

    pub fn get_following(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> EngagementResult<Vec<Relationship>> {
        self.store
            .list_following(self.options.deadline(), user_id, limit, offset)
            .map_err(|err| engine_error("subscription.get_following", err))
    }

    pub fn count_followers(&self, user_id: UserId) -> EngagementResult<u64> {
        self.store
            .count_followers(self.options.deadline(), user_id)
            .map_err(|err| engine_error("subscription.count_followers", err))
    }

    pub fn count_following(&self, user_id: UserId) -> EngagementResult<u64> {
        self.store
            .count_following(self.options.deadline(), user_id)
            .map_err(|err| engine_error("subscription.count_following", err))
    }

    /// Physically removes the edge for administrative cleanup. No event.
    pub fn purge_relationship(
        &self,
        follower_id: UserId,
        followee_id: UserId,
    ) -> EngagementResult<()> {
        require_identity(follower_id, "follower_id")?;
        require_identity(followee_id, "followee_id")?;
        self.store
            .hard_delete(self.options.deadline(), follower_id, followee_id)
            .map_err(|err| engine_error("subscription.purge_relationship", err))
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionService;
    use crate::db::ConnectionPool;
    use crate::error::{EngagementError, ErrorKind};
    use crate::event::{ChannelPublisher, EventDispatcher, EventDispatcherConfig};
    use crate::repo::relationship_repo::SqliteRelationshipStore;
    use crate::service::EngineOptions;
    use std::sync::Arc;
    use uuid::Uuid;

    fn service() -> SubscriptionService<SqliteRelationshipStore> {
        let pool = Arc::new(ConnectionPool::open_in_memory().unwrap());
        let (publisher, _rx) = ChannelPublisher::new("engagement", 16);
        let dispatcher = Arc::new(
            EventDispatcher::start(EventDispatcherConfig::default(), Arc::new(publisher)).unwrap(),
        );
        SubscriptionService::new(
            SqliteRelationshipStore::new(pool),
            dispatcher,
            EngineOptions::default(),
        )
    }

    #[test]
    fn self_follow_never_reaches_store() {
        let service = service();
        let user = Uuid::new_v4();
        let err = service.follow(user, user).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(service.count_following(user).unwrap(), 0);
    }

    #[test]
    fn purge_removes_tombstoned_edge() {
        let service = service();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        service.follow(a, b).unwrap();
        service.unfollow(a, b).unwrap();
        service.purge_relationship(a, b).unwrap();
        assert!(matches!(
            service.purge_relationship(a, b),
            Err(EngagementError::NotFound { .. })
        ));
    }

    #[test]
    fn reactivated_edge_keeps_its_id() {
        let service = service();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let first = service.follow(a, b).unwrap();
        service.unfollow(a, b).unwrap();
        let second = service.follow(a, b).unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.is_active());
        assert!(second.created_at >= first.created_at);
        assert!(service.is_following(a, b).unwrap());
    }
}

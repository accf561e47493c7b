//! Core engagement write path: follow/unfollow and like/unlike.
//! This crate is the single source of truth for engagement invariants.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use bootstrap::{bootstrap, BootstrapError, EngagementRuntime};
pub use config::{ConfigError, EngagementConfig};
pub use db::{ConnectionPool, DbError, Deadline};
pub use error::{error_chain, EngagementError, EngagementResult, ErrorKind};
pub use event::{
    ChannelPublisher, EngagementEvent, EventDispatcher, EventPublisher, LoggingPublisher,
    PublishError, ShutdownReport,
};
pub use logging::{init_logging, logging_status, LogTarget};
pub use model::reaction::{Reaction, ReactionId};
pub use model::relationship::{Relationship, RelationshipId};
pub use model::{TargetId, UserId, ValidationError};
pub use repo::reaction_repo::{ReactionStore, SqliteReactionStore};
pub use repo::relationship_repo::{RelationshipStore, SqliteRelationshipStore};
pub use repo::{StoreError, StoreResult};
pub use service::query_service::{EngagementQueries, FollowCounts};
pub use service::reaction_service::ReactionService;
pub use service::subscription_service::SubscriptionService;
pub use service::EngineOptions;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

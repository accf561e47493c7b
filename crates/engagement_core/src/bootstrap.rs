//! Startup wiring and graceful shutdown.
//!
//! # Responsibility
//! - Build the pool, stores, dispatcher and engines once from config.
//! - Drain pending notifications on shutdown within the configured grace.
//!
//! # Invariants
//! - Engines share one pool and one dispatcher; nothing is global.
//! - Stores are usable only after migrations and indexes succeeded.

use crate::config::{ConfigError, EngagementConfig};
use crate::db::{ConnectionPool, DbError};
use crate::event::{EventDispatcher, EventDispatcherConfig, EventPublisher, ShutdownReport};
use crate::repo::reaction_repo::{ReactionStore, SqliteReactionStore};
use crate::repo::relationship_repo::{RelationshipStore, SqliteRelationshipStore};
use crate::repo::StoreError;
use crate::service::query_service::EngagementQueries;
use crate::service::reaction_service::ReactionService;
use crate::service::subscription_service::SubscriptionService;
use crate::service::EngineOptions;
use log::{error, info};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

pub type SubscriptionEngine = SubscriptionService<SqliteRelationshipStore>;
pub type ReactionEngine = ReactionService<SqliteReactionStore>;
pub type QueryEngine = EngagementQueries<SqliteRelationshipStore, SqliteReactionStore>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open database: {0}")]
    Db(#[from] DbError),
    #[error("failed to prepare stores: {0}")]
    Store(#[from] StoreError),
    #[error("failed to start event dispatcher: {0}")]
    Dispatcher(#[source] std::io::Error),
}

/// Fully wired engagement engines.
pub struct EngagementRuntime {
    subscriptions: SubscriptionEngine,
    reactions: ReactionEngine,
    queries: QueryEngine,
    dispatcher: Arc<EventDispatcher>,
    pool: Arc<ConnectionPool>,
    shutdown_grace: Duration,
}

impl EngagementRuntime {
    pub fn subscriptions(&self) -> &SubscriptionEngine {
        &self.subscriptions
    }

    pub fn reactions(&self) -> &ReactionEngine {
        &self.reactions
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Stops accepting events and drains the queue within the configured
    /// grace period.
    pub fn shutdown(&self) -> ShutdownReport {
        self.dispatcher.shutdown(self.shutdown_grace)
    }
}

/// Builds the runtime described by `config`, publishing through `publisher`.
///
/// An in-memory database always gets a single-connection pool.
pub fn bootstrap(
    config: &EngagementConfig,
    publisher: Arc<dyn EventPublisher>,
) -> Result<EngagementRuntime, BootstrapError> {
    let started_at = Instant::now();
    config.validate()?;

    let result = build(config, publisher);
    match &result {
        Ok(runtime) => info!(
            "event=bootstrap module=core status=ok pool_size={} duration_ms={}",
            runtime.pool.size(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=bootstrap module=core status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn build(
    config: &EngagementConfig,
    publisher: Arc<dyn EventPublisher>,
) -> Result<EngagementRuntime, BootstrapError> {
    let pool = if config.database.is_in_memory() {
        ConnectionPool::open_in_memory()?
    } else {
        ConnectionPool::open(&config.database.path, config.database.pool_size)?
    };
    let pool = Arc::new(pool);
    let options = EngineOptions::with_op_timeout(config.store.op_timeout());

    let relationships = SqliteRelationshipStore::new(Arc::clone(&pool));
    let reactions = SqliteReactionStore::new(Arc::clone(&pool));
    relationships.ensure_indexes(options.deadline())?;
    reactions.ensure_indexes(options.deadline())?;

    let dispatcher = EventDispatcher::start(
        EventDispatcherConfig {
            queue_capacity: config.events.queue_capacity,
        },
        publisher,
    )
    .map_err(BootstrapError::Dispatcher)?;
    let dispatcher = Arc::new(dispatcher);

    Ok(EngagementRuntime {
        subscriptions: SubscriptionService::new(
            relationships.clone(),
            Arc::clone(&dispatcher),
            options,
        ),
        reactions: ReactionService::new(reactions.clone(), options),
        queries: EngagementQueries::new(relationships, reactions, options),
        dispatcher,
        pool,
        shutdown_grace: config.events.shutdown_grace(),
    })
}

//! Best-effort engagement notifications.
//!
//! # Responsibility
//! - Define the wire payloads and routing keys of engagement events.
//! - Define the publisher contract consumed by the engines.
//! - Run publishes on a detached worker so callers never wait on a broker.
//!
//! # Invariants
//! - An event is submitted only after its mutation committed.
//! - Each event is attempted at most once; failures are logged, not returned.

pub mod dispatcher;
pub mod payload;
pub mod publisher;

pub use dispatcher::{DispatcherStats, EventDispatcher, EventDispatcherConfig, ShutdownReport};
pub use payload::{
    EngagementEvent, SubscriptionCreatedPayload, SubscriptionDeletedPayload,
    TOPIC_SUBSCRIPTION_CREATED, TOPIC_SUBSCRIPTION_DELETED,
};
pub use publisher::{
    ChannelPublisher, EventPublisher, LoggingPublisher, PublishError, PublishedMessage,
};

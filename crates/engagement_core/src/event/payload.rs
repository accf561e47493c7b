//! Engagement event payloads and routing keys.

use crate::model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TOPIC_SUBSCRIPTION_CREATED: &str = "subscription.created";
pub const TOPIC_SUBSCRIPTION_DELETED: &str = "subscription.deleted";

/// Body of `subscription.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCreatedPayload {
    pub follower_id: UserId,
    pub followee_id: UserId,
    /// Creation instant in unix seconds.
    pub created_at_unix: i64,
}

/// Body of `subscription.deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDeletedPayload {
    pub follower_id: UserId,
    pub followee_id: UserId,
    /// Deletion instant in unix seconds.
    pub deleted_at_unix: i64,
}

/// Event queued for publication after a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngagementEvent {
    SubscriptionCreated(SubscriptionCreatedPayload),
    SubscriptionDeleted(SubscriptionDeletedPayload),
}

impl EngagementEvent {
    pub fn subscription_created(
        follower_id: UserId,
        followee_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::SubscriptionCreated(SubscriptionCreatedPayload {
            follower_id,
            followee_id,
            created_at_unix: created_at.timestamp(),
        })
    }

    pub fn subscription_deleted(
        follower_id: UserId,
        followee_id: UserId,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        Self::SubscriptionDeleted(SubscriptionDeletedPayload {
            follower_id,
            followee_id,
            deleted_at_unix: deleted_at.timestamp(),
        })
    }

    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::SubscriptionCreated(_) => TOPIC_SUBSCRIPTION_CREATED,
            Self::SubscriptionDeleted(_) => TOPIC_SUBSCRIPTION_DELETED,
        }
    }

    /// Encodes the payload as JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::SubscriptionCreated(payload) => serde_json::to_vec(payload),
            Self::SubscriptionDeleted(payload) => serde_json::to_vec(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EngagementEvent, TOPIC_SUBSCRIPTION_CREATED, TOPIC_SUBSCRIPTION_DELETED};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn created_payload_uses_unix_seconds() {
        let (follower, followee) = (Uuid::new_v4(), Uuid::new_v4());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let event = EngagementEvent::subscription_created(follower, followee, at);
        assert_eq!(event.routing_key(), TOPIC_SUBSCRIPTION_CREATED);

        let json: serde_json::Value = serde_json::from_slice(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["follower_id"], follower.to_string());
        assert_eq!(json["followee_id"], followee.to_string());
        assert_eq!(json["created_at_unix"], at.timestamp());
    }

    #[test]
    fn deleted_payload_carries_deleted_at_unix() {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap();
        let event = EngagementEvent::subscription_deleted(Uuid::new_v4(), Uuid::new_v4(), at);
        assert_eq!(event.routing_key(), TOPIC_SUBSCRIPTION_DELETED);

        let json: serde_json::Value = serde_json::from_slice(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["deleted_at_unix"], at.timestamp());
        assert!(json.get("created_at_unix").is_none());
    }
}

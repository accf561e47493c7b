//! Publisher contract and in-process adapters.
//!
//! # Responsibility
//! - Define the single `publish(routing_key, payload)` seam to a broker.
//! - Provide a log sink and a bounded in-process channel sink.
//!
//! # Invariants
//! - Adapters never block: a full or closed sink is an immediate error.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::info;
use thiserror::Error;

/// Broker-side failure reported by a publisher adapter.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher for exchange `{exchange}` is closed")]
    Closed { exchange: String },
    #[error("publisher for exchange `{exchange}` rejected `{routing_key}`: {reason}")]
    Rejected {
        exchange: String,
        routing_key: String,
        reason: String,
    },
}

/// Fire-and-forget publish seam to a topic exchange.
pub trait EventPublisher: Send + Sync {
    /// Attempts one delivery of `payload` under `routing_key`.
    fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Publisher that records each event in the application log.
#[derive(Debug, Clone)]
pub struct LoggingPublisher {
    exchange: String,
}

impl LoggingPublisher {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
        }
    }
}

impl EventPublisher for LoggingPublisher {
    fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
        info!(
            "event=event_publish module=event status=ok exchange={} routing_key={} body={}",
            self.exchange,
            routing_key,
            String::from_utf8_lossy(payload)
        );
        Ok(())
    }
}

/// One message handed to a `ChannelPublisher` consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// Publisher that fans events out over a bounded in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    exchange: String,
    tx: Sender<PublishedMessage>,
}

impl ChannelPublisher {
    /// Creates a publisher and the receiving end its consumer drains.
    pub fn new(
        exchange: impl Into<String>,
        capacity: usize,
    ) -> (Self, Receiver<PublishedMessage>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                exchange: exchange.into(),
                tx,
            },
            rx,
        )
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let message = PublishedMessage {
            exchange: self.exchange.clone(),
            routing_key: routing_key.to_string(),
            body: payload.to_vec(),
        };
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PublishError::Rejected {
                exchange: self.exchange.clone(),
                routing_key: routing_key.to_string(),
                reason: "consumer queue is full".to_string(),
            }),
            Err(TrySendError::Disconnected(_)) => Err(PublishError::Closed {
                exchange: self.exchange.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelPublisher, EventPublisher, LoggingPublisher, PublishError};

    #[test]
    fn channel_publisher_delivers_to_consumer() {
        let (publisher, rx) = ChannelPublisher::new("engagement", 4);
        publisher
            .publish("subscription.created", br#"{"ok":true}"#)
            .unwrap();
        let message = rx.try_recv().unwrap();
        assert_eq!(message.exchange, "engagement");
        assert_eq!(message.routing_key, "subscription.created");
        assert_eq!(message.body, br#"{"ok":true}"#.to_vec());
    }

    #[test]
    fn channel_publisher_rejects_when_full_and_closed() {
        let (publisher, rx) = ChannelPublisher::new("engagement", 1);
        publisher.publish("a", b"1").unwrap();
        assert!(matches!(
            publisher.publish("b", b"2"),
            Err(PublishError::Rejected { .. })
        ));
        drop(rx);
        assert!(matches!(
            publisher.publish("c", b"3"),
            Err(PublishError::Closed { .. })
        ));
    }

    #[test]
    fn logging_publisher_never_fails() {
        LoggingPublisher::new("engagement")
            .publish("subscription.deleted", b"{}")
            .unwrap();
    }
}

//! Cross-window broadcast channel.
//!
//! Delivery is best-effort and at-most-once per subscriber: no acks, no
//! retries, and nothing is held for windows that are not yet listening. A
//! lagged subscriber simply loses messages and converges again on the next
//! periodic state broadcast.

use crate::domain::timer::SyncMessage;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Wire envelope. The underlying channel delivers to every subscriber, so the
/// sender id lets each window drop its own messages, matching a platform
/// channel that never delivers to its own window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub sender: String,
    #[serde(flatten)]
    pub message: SyncMessage,
}

pub trait MessageBus: Send + Sync {
    /// Returns how many subscribers the message reached; zero when no sibling
    /// window is listening, which is not an error.
    fn publish(&self, envelope: Envelope) -> Result<usize, InfraError>;
}

#[derive(Debug)]
pub struct BroadcastBus {
    sender: broadcast::Sender<Envelope>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for BroadcastBus {
    fn publish(&self, envelope: Envelope) -> Result<usize, InfraError> {
        // A send error only means nobody is subscribed.
        Ok(self.sender.send(envelope).unwrap_or(0))
    }
}

/// Test double that records every published envelope.
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<Envelope>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<Envelope> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    pub fn take_published(&self) -> Vec<Envelope> {
        self.published
            .lock()
            .map(|mut published| std::mem::take(&mut *published))
            .unwrap_or_default()
    }
}

impl MessageBus for RecordingBus {
    fn publish(&self, envelope: Envelope) -> Result<usize, InfraError> {
        let mut published = self
            .published
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("bus lock poisoned: {error}")))?;
        published.push(envelope);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timer::TimerAction;

    #[test]
    fn publish_without_subscribers_reaches_nobody() {
        let bus = BroadcastBus::new();
        let reached = bus
            .publish(Envelope {
                sender: "win-1".to_string(),
                message: SyncMessage::TimerComplete,
            })
            .expect("publish");
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_envelope() {
        let bus = BroadcastBus::new();
        let mut inbox = bus.subscribe();

        bus.publish(Envelope {
            sender: "win-1".to_string(),
            message: SyncMessage::Action {
                action: TimerAction::Start,
            },
        })
        .expect("publish");

        let received = inbox.recv().await.expect("receive");
        assert_eq!(received.sender, "win-1");
        assert_eq!(
            received.message,
            SyncMessage::Action {
                action: TimerAction::Start
            }
        );
    }

    #[test]
    fn envelope_wire_format_is_flat() {
        let value = serde_json::to_value(Envelope {
            sender: "win-1".to_string(),
            message: SyncMessage::SyncState {
                time_left: 42,
                is_active: true,
            },
        })
        .expect("serialize envelope");
        assert_eq!(value["sender"], "win-1");
        assert_eq!(value["type"], "SYNC_STATE");
        assert_eq!(value["payload"]["timeLeft"], 42);
    }

    #[test]
    fn recording_bus_captures_messages_in_order() {
        let bus = RecordingBus::default();
        bus.publish(Envelope {
            sender: "win-1".to_string(),
            message: SyncMessage::DataUpdated,
        })
        .expect("publish");
        bus.publish(Envelope {
            sender: "win-1".to_string(),
            message: SyncMessage::TimerComplete,
        })
        .expect("publish");

        let published = bus.take_published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].message, SyncMessage::DataUpdated);
        assert_eq!(published[1].message, SyncMessage::TimerComplete);
        assert!(bus.published().is_empty());
    }
}

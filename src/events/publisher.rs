use super::types::OrderStateChanged;
use crate::config::EventsConfig;
use crate::constants::system::{DEFAULT_EVENT_CHANNEL_CAPACITY, MAX_EVENT_CHANNEL_CAPACITY};
use tokio::sync::broadcast;

/// Post-commit notification seam used by the state-change coordinator.
///
/// `publish` must not block; the coordinator calls it after the unit of work
/// has committed and only logs a failure.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: OrderStateChanged) -> Result<(), PublishError>;
}

/// Broadcast-based event publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub event: OrderStateChanged,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher; capacity is clamped to
    /// `1..=MAX_EVENT_CHANNEL_CAPACITY`
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_CHANNEL_CAPACITY));
        Self { sender }
    }

    /// Create a publisher sized by `events.channel_capacity`
    pub fn from_config(config: &EventsConfig) -> Self {
        Self::new(config.channel_capacity)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventBus for EventPublisher {
    fn publish(&self, event: OrderStateChanged) -> Result<(), PublishError> {
        let published = PublishedEvent {
            name: event.name().to_string(),
            event,
            published_at: chrono::Utc::now(),
        };

        // send() only fails when nobody is subscribed, which is fine
        match self.sender.send(published) {
            Ok(receivers) => {
                tracing::trace!(receivers, "Published order event");
                Ok(())
            }
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event rejected by listener: {0}")]
    Rejected(String),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

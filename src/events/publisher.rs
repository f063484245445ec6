use std::sync::Arc;

use rabbitmq::{Message, MessageSink, PublisherContext};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{codec, types::DomainEvent};

/// What happened to an event handed to [`EventPublisher::publish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the broker connection; delivery is not confirmed
    Published { message_id: String },
    /// Dropped without raising, e.g. while the broker connection is down
    Skipped { reason: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Fire-and-forget publisher of domain events on one fanout exchange
///
/// Never blocks on the broker and never fails the caller: anything that goes
/// wrong is logged and reported as [`PublishOutcome::Skipped`].
#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn MessageSink>,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    pub fn exchange(&self) -> &str {
        self.sink.exchange()
    }

    pub fn publish(&self, event: &DomainEvent) -> PublishOutcome {
        let bytes = match codec::encode(event) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("dropping {} event: {}", event.event_type, err);
                return PublishOutcome::Skipped {
                    reason: err.to_string(),
                };
            }
        };

        let message_id = Uuid::new_v4().to_string();
        let ctx = PublisherContext::new(&message_id, Some(message_id.clone()));

        match self.sink.publish(Message::content(bytes), ctx) {
            Ok(()) => {
                debug!(
                    "published {} to {} as {}",
                    event.event_type,
                    self.exchange(),
                    message_id
                );
                PublishOutcome::Published { message_id }
            }
            Err(err) if err.is_not_connected() => {
                warn!(
                    "publish skipped: {} event for {} dropped, broker not connected",
                    event.event_type,
                    self.exchange()
                );
                PublishOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                warn!(
                    "publish skipped: {} event for {} dropped: {}",
                    event.event_type,
                    self.exchange(),
                    err
                );
                PublishOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
        }
    }
}

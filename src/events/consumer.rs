//--------------------------------------------------------------------------------------------------
// STRUCTS & TRAITS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                          | Key Methods        |
// |-----------------|------------------------------------------------------|--------------------|
// | EventHandler    | Reaction to one or more event types                  | handle_event       |
// | Disposition     | Outcome of processing one delivery                   |                    |
// | EventConsumer   | Decodes deliveries and routes them to handlers       | register, spawn    |
// | ConsumerHandle  | Owns the consumption task                            | stats, stop, join  |
//--------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use rabbitmq::{Delivery, DeliveryStream};
use tokio::{select, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    codec,
    types::{DomainEvent, EventResult, EventType},
};

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the types of events this handler processes
    fn event_types(&self) -> Vec<EventType>;

    async fn handle_event(&self, event: &DomainEvent) -> EventResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A handler ran and succeeded
    Handled,
    /// Valid envelope nobody is interested in
    Ignored,
    /// Undecodable bytes
    Discarded,
    /// The handler returned an error
    Failed,
}

impl Disposition {
    /// Whether the delivery should be acked rather than rejected
    pub fn settles_ok(self) -> bool {
        matches!(self, Self::Handled | Self::Ignored)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub handled: u64,
    pub ignored: u64,
    pub discarded: u64,
    pub failed: u64,
}

impl ConsumerStats {
    pub fn total(&self) -> u64 {
        self.handled + self.ignored + self.discarded + self.failed
    }
}

#[derive(Default)]
struct Counters {
    handled: AtomicU64,
    ignored: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn record(&self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Handled => &self.handled,
            Disposition::Ignored => &self.ignored,
            Disposition::Discarded => &self.discarded,
            Disposition::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            handled: self.handled.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Routes decoded events to the handler registered for their type
#[derive(Default)]
pub struct EventConsumer {
    handlers: HashMap<EventType, Arc<dyn EventHandler>>,
    counters: Arc<Counters>,
}

impl fmt::Debug for EventConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventConsumer")
            .field("event_types", &self.handlers.keys().collect::<Vec<_>>())
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

impl EventConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for each of its event types. One handler per type;
    /// a later registration replaces the earlier one.
    pub fn register(mut self, handler: Arc<dyn EventHandler>) -> Self {
        for event_type in handler.event_types() {
            if self
                .handlers
                .insert(event_type, handler.clone())
                .is_some()
            {
                warn!("handler for {} replaced", event_type);
            }
        }
        self
    }

    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    /// Decodes and dispatches one delivery. Never fails: every problem is
    /// logged and folded into the returned [`Disposition`].
    pub async fn process(&self, delivery: &Delivery) -> Disposition {
        let disposition = self.dispatch(delivery).await;
        self.counters.record(disposition);
        disposition
    }

    async fn dispatch(&self, delivery: &Delivery) -> Disposition {
        let event = match codec::decode(&delivery.content) {
            Ok(event) => event,
            Err(err) => {
                error!(
                    "discarding message {:?}: {}",
                    delivery.message_id.as_deref().unwrap_or("-"),
                    err
                );
                return Disposition::Discarded;
            }
        };

        let Some(handler) = event.kind().and_then(|kind| self.handlers.get(&kind)) else {
            debug!("ignoring {} event", event.event_type);
            return Disposition::Ignored;
        };

        match handler.handle_event(&event).await {
            Ok(()) => Disposition::Handled,
            Err(err) => {
                error!("{} event not applied: {}", event.event_type, err);
                Disposition::Failed
            }
        }
    }

    /// Moves the consumer onto its own task that drains `stream` one delivery
    /// at a time. In manual ack mode handled and ignored deliveries are acked,
    /// discarded and failed ones rejected.
    ///
    /// The task ends when the stream closes or the handle is stopped.
    pub fn spawn<S>(self, mut stream: S) -> ConsumerHandle
    where
        S: DeliveryStream + 'static,
    {
        let counters = self.counters.clone();
        let token = CancellationToken::new();
        let cloned_token = token.clone();

        let task = tokio::spawn(async move {
            info!("event consumer started ({:?} ack)", stream.ack_mode());
            loop {
                let delivery = select! {
                    _ = cloned_token.cancelled() => {
                        debug!("event consumer stopped");
                        return
                    },
                    delivery = stream.receive() => match delivery {
                        Some(delivery) => delivery,
                        None => {
                            warn!("delivery stream closed, event consumer exiting");
                            return
                        }
                    },
                };

                let disposition = self.process(&delivery).await;
                let settled = if disposition.settles_ok() {
                    stream.ack(&delivery).await
                } else {
                    stream.reject(&delivery).await
                };
                if let Err(err) = settled {
                    error!("failed to settle delivery: {}", err);
                }
            }
        });

        ConsumerHandle {
            counters,
            token,
            task,
        }
    }
}

/// Handle to a running consumption task
pub struct ConsumerHandle {
    counters: Arc<Counters>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops after the delivery currently being processed, if any
    pub async fn stop(self) {
        self.token.cancel();
        self.join().await;
    }

    /// Waits for the stream to close
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            error!("event consumer task failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventError;
    use parking_lot::Mutex;
    use rabbitmq::{AckMode, LocalExchange, Message, MessageSink, PublisherContext};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<DomainEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn event_types(&self) -> Vec<EventType> {
            vec![EventType::UserCreated]
        }

        async fn handle_event(&self, event: &DomainEvent) -> EventResult<()> {
            self.seen.lock().push(event.clone());
            if self.fail {
                return Err(EventError::Handler("boom".to_owned()));
            }
            Ok(())
        }
    }

    fn delivery(body: &str) -> Delivery {
        Delivery::new(body.as_bytes().to_vec())
    }

    const USER_CREATED: &str = r#"{"type":"USER_CREATED","data":{"id":1,"email":"a@x.com"}}"#;

    #[tokio::test]
    async fn process_classifies_each_delivery() {
        let recorder = Arc::new(Recorder::default());
        let consumer = EventConsumer::new().register(recorder.clone());

        assert_eq!(consumer.process(&delivery(USER_CREATED)).await, Disposition::Handled);
        assert_eq!(consumer.process(&delivery("{oops")).await, Disposition::Discarded);
        assert_eq!(
            consumer
                .process(&delivery(r#"{"type":"VEHICLE_CREATED","data":{}}"#))
                .await,
            Disposition::Ignored
        );

        assert_eq!(recorder.seen.lock().len(), 1);
        assert_eq!(
            consumer.stats(),
            ConsumerStats {
                handled: 1,
                ignored: 1,
                discarded: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn unknown_types_never_reach_handlers() {
        let recorder = Arc::new(Recorder::default());
        let consumer = EventConsumer::new().register(recorder.clone());

        for body in [
            r#"{"type":"USER_ARCHIVED","data":{"id":1}}"#,
            r#"{"type":"SOMETHING","data":{}}"#,
        ] {
            assert_eq!(consumer.process(&delivery(body)).await, Disposition::Ignored);
        }
        assert!(recorder.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn handler_error_is_failed_not_fatal() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let consumer = EventConsumer::new().register(recorder);
        assert_eq!(consumer.process(&delivery(USER_CREATED)).await, Disposition::Failed);
    }

    #[tokio::test]
    async fn spawned_consumer_survives_malformed_message_and_settles_manually() {
        let exchange = LocalExchange::new("user_events");
        let queue = exchange.bind(AckMode::Manual);
        let settlements = queue.settlements();

        let recorder = Arc::new(Recorder::default());
        let handle = EventConsumer::new().register(recorder.clone()).spawn(queue);

        for body in ["\u{0}garbage", USER_CREATED] {
            exchange
                .publish(Message::from(body), PublisherContext::new("req", None))
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.stats().total() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(recorder.seen.lock().len(), 1);
        let settled = settlements.snapshot();
        assert_eq!(settled.rejected.len(), 1);
        assert_eq!(settled.acked.len(), 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn consumer_exits_when_stream_closes() {
        let exchange = LocalExchange::new("user_events");
        let queue = exchange.bind(AckMode::Auto);
        let handle = EventConsumer::new().spawn(queue);
        drop(exchange);

        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap();
    }
}

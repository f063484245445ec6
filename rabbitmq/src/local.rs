//! In-process fanout exchange with the same delivery contract as the broker
//! path: each bound queue is private, gets every message published while it
//! is bound, and sees nothing published before it was bound.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use crate::{
    error::RabbitMQError,
    publisher::{Message, MessageSink, PublisherContext},
    subscription::{AckMode, Delivery, DeliveryStream},
};

#[derive(Default)]
struct ExchangeInner {
    queues: Mutex<Vec<UnboundedSender<Delivery>>>,
    next_tag: AtomicU64,
}

#[derive(Clone, Default)]
pub struct LocalExchange {
    name: String,
    inner: Arc<ExchangeInner>,
}

impl LocalExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            inner: Arc::default(),
        }
    }

    /// Binds a fresh exclusive queue. Dropping the queue unbinds it.
    pub fn bind(&self, ack_mode: AckMode) -> LocalQueue {
        let (tx, rx) = unbounded_channel();
        self.inner.queues.lock().push(tx);
        LocalQueue {
            receiver: rx,
            ack_mode,
            settlements: Arc::default(),
        }
    }

    /// Number of queues currently bound
    pub fn bound_queues(&self) -> usize {
        let mut queues = self.inner.queues.lock();
        queues.retain(|queue| !queue.is_closed());
        queues.len()
    }
}

impl MessageSink for LocalExchange {
    fn publish(&self, message: Message, ctx: PublisherContext) -> Result<(), RabbitMQError> {
        let content = message.into_bytes();
        let message_id = ctx.message_id().map(str::to_owned);
        let mut queues = self.inner.queues.lock();

        queues.retain(|queue| {
            let delivery = Delivery {
                content: content.clone(),
                delivery_tag: Some(self.inner.next_tag.fetch_add(1, Ordering::Relaxed) + 1),
                message_id: message_id.clone(),
            };
            queue.send(delivery).is_ok()
        });

        debug!("fanned out message to {} local queue(s) on {}", queues.len(), self.name);
        Ok(())
    }

    fn exchange(&self) -> &str {
        &self.name
    }
}

/// What a consumer did with the deliveries of a [`LocalQueue`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Settlements {
    pub acked: Vec<u64>,
    pub rejected: Vec<u64>,
}

pub struct LocalQueue {
    receiver: UnboundedReceiver<Delivery>,
    ack_mode: AckMode,
    settlements: Arc<Mutex<Settlements>>,
}

impl LocalQueue {
    /// Shared view of acks and rejects, readable after the queue was moved
    /// into a consumer
    pub fn settlements(&self) -> SettlementLog {
        SettlementLog(self.settlements.clone())
    }
}

#[derive(Clone)]
pub struct SettlementLog(Arc<Mutex<Settlements>>);

impl SettlementLog {
    pub fn snapshot(&self) -> Settlements {
        self.0.lock().clone()
    }
}

#[async_trait]
impl DeliveryStream for LocalQueue {
    async fn receive(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), RabbitMQError> {
        if self.ack_mode.is_auto() {
            return Ok(());
        }
        let tag = delivery.delivery_tag.ok_or(RabbitMQError::NotDeliveryTag)?;
        self.settlements.lock().acked.push(tag);
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery) -> Result<(), RabbitMQError> {
        if self.ack_mode.is_auto() {
            return Ok(());
        }
        let tag = delivery.delivery_tag.ok_or(RabbitMQError::NotDeliveryTag)?;
        self.settlements.lock().rejected.push(tag);
        Ok(())
    }

    fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }
}

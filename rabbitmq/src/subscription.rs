use amqprs::channel::{
    BasicAckArguments, BasicCancelArguments, BasicConsumeArguments, BasicNackArguments, Channel,
    ConsumerMessage,
};
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::{
    connection::BrokerConnection,
    error::RabbitMQError,
    topology::{ExchangeSpec, QueueSpec, bind_queue, declare_dead_letter, declare_exchange, declare_queue},
};

/// Acknowledgment policy of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AckMode {
    /// Broker considers a message consumed the instant it is delivered.
    /// At-most-once: nothing is redelivered when processing fails.
    #[default]
    Auto,
    /// The consumer acks after processing or rejects; rejected messages go to
    /// the queue's dead-letter exchange if one is configured.
    Manual,
}

impl AckMode {
    pub fn is_auto(self) -> bool {
        self == Self::Auto
    }
}

impl std::str::FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown ack mode: {other}")),
        }
    }
}

/// One message as handed to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub content: Vec<u8>,
    pub delivery_tag: Option<u64>,
    pub message_id: Option<String>,
}

impl Delivery {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            delivery_tag: None,
            message_id: None,
        }
    }

    fn tag(&self) -> Result<u64, RabbitMQError> {
        self.delivery_tag.ok_or(RabbitMQError::NotDeliveryTag)
    }
}

impl From<ConsumerMessage> for Delivery {
    fn from(message: ConsumerMessage) -> Self {
        Self {
            content: message.content.unwrap_or_default(),
            delivery_tag: message.deliver.map(|deliver| deliver.delivery_tag()),
            message_id: message
                .basic_properties
                .and_then(|props| props.message_id().cloned()),
        }
    }
}

/// Pull-based source of deliveries with explicit settlement
///
/// `ack` and `reject` are no-ops in [`AckMode::Auto`].
#[async_trait]
pub trait DeliveryStream: Send {
    /// Next delivery, or `None` once the stream is closed for good
    async fn receive(&mut self) -> Option<Delivery>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), RabbitMQError>;

    /// Negative acknowledgment without requeue
    async fn reject(&self, delivery: &Delivery) -> Result<(), RabbitMQError>;

    fn ack_mode(&self) -> AckMode;
}

/// Subscription for consuming messages from a queue bound to a fanout exchange
///
/// ## Message Flow
///
/// 1. Call `receive()` to get the next available message
/// 2. Process the message according to your application logic
/// 3. Call `ack()` or `reject()` (ignored if auto-acknowledgment is enabled)
///
/// The consumer channel is the connection's shared channel; `close()` cancels
/// the consumer but leaves the channel to the [`BrokerConnection`].
pub struct Subscription {
    exchange: String,
    rabbit_queue_name: String,
    consumer_tag: String,
    consumer: UnboundedReceiver<ConsumerMessage>,
    channel: Channel,
    ack_mode: AckMode,
}

impl Subscription {
    /// Declares `exchange`, the queue described by `queue` and their binding,
    /// then starts consuming
    ///
    /// # Errors
    /// Returns `RabbitMQError::NotConnected` if the connection is down, or the
    /// declaration/subscription error reported by the broker
    pub async fn bind(
        connection: &BrokerConnection,
        exchange: &ExchangeSpec,
        queue: &QueueSpec,
        ack_mode: AckMode,
    ) -> Result<Self, RabbitMQError> {
        let channel = connection.require_channel()?;

        declare_exchange(&channel, exchange).await?;
        if let Some(dead_letter) = queue.dead_letter() {
            declare_dead_letter(&channel, dead_letter).await?;
        }

        let queue_name = declare_queue(&channel, queue).await?;
        bind_queue(&channel, &queue_name, &exchange.name, "").await?;

        let consume_args = BasicConsumeArguments::new(&queue_name, "")
            .auto_ack(ack_mode.is_auto())
            .finish();

        let (consumer_tag, rx) = channel
            .basic_consume_rx(consume_args)
            .await
            .map_err(|err| RabbitMQError::SubscriptionError(err.to_string()))?;

        info!(
            "Subscribed queue {} to exchange {} ({:?} ack)",
            queue_name, exchange.name, ack_mode
        );

        Ok(Self {
            exchange: exchange.name.clone(),
            rabbit_queue_name: queue_name,
            consumer_tag,
            consumer: rx,
            channel,
            ack_mode,
        })
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange
    }

    /// Returns the RabbitMQ queue name (server-assigned for exclusive queues)
    pub fn rabbit_queue_name(&self) -> &str {
        &self.rabbit_queue_name
    }

    /// Cancels the consumer
    ///
    /// # Errors
    /// Returns an error if the broker rejects the cancel
    pub async fn close(self) -> Result<(), RabbitMQError> {
        self.channel
            .basic_cancel(BasicCancelArguments::new(&self.consumer_tag))
            .await
            .map_err(|err| RabbitMQError::CloseChannelError(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl DeliveryStream for Subscription {
    async fn receive(&mut self) -> Option<Delivery> {
        self.consumer.recv().await.map(Delivery::from)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), RabbitMQError> {
        if self.ack_mode.is_auto() {
            debug!("ack not needed");
            return Ok(());
        }

        self.channel
            .basic_ack(BasicAckArguments::new(delivery.tag()?, false))
            .await
            .map_err(|err| RabbitMQError::AckMessageError(err.to_string()))
    }

    async fn reject(&self, delivery: &Delivery) -> Result<(), RabbitMQError> {
        if self.ack_mode.is_auto() {
            debug!("reject not possible in auto ack mode");
            return Ok(());
        }

        self.channel
            .basic_nack(BasicNackArguments::new(delivery.tag()?, false, false))
            .await
            .map_err(|err| RabbitMQError::AckMessageError(err.to_string()))
    }

    fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_mode_parses_case_insensitively() {
        assert_eq!("Manual".parse::<AckMode>(), Ok(AckMode::Manual));
        assert_eq!(" auto ".parse::<AckMode>(), Ok(AckMode::Auto));
        assert!("sometimes".parse::<AckMode>().is_err());
        assert_eq!(AckMode::default(), AckMode::Auto);
    }

    #[test]
    fn delivery_without_tag_cannot_be_settled() {
        let delivery = Delivery::new(b"{}".to_vec());
        assert!(matches!(delivery.tag(), Err(RabbitMQError::NotDeliveryTag)));
    }

    #[tokio::test]
    async fn bind_requires_a_live_connection() {
        let connection = BrokerConnection::new("amqp://localhost:5672", "TEST_APP");
        let result = Subscription::bind(
            &connection,
            &ExchangeSpec::fanout("user_events"),
            &QueueSpec::exclusive(),
            AckMode::Auto,
        )
        .await;
        assert!(matches!(result, Err(RabbitMQError::NotConnected)));
    }
}

//! RabbitMQ plumbing shared by the platform services.
//!
//! | Component          | Description                                                   |
//! |--------------------|---------------------------------------------------------------|
//! | BrokerConnection   | Single owned connection + channel, retry on open, state watch |
//! | topology           | Idempotent fanout exchange / queue / binding declarations     |
//! | Publisher          | Fire-and-forget publishing through a background task          |
//! | Subscription       | Queue consumer with auto or manual acknowledgment             |
//! | LocalExchange      | In-process fanout with the same contracts, for tests          |

mod connection;
mod error;
mod local;
mod publisher;
mod retry;
mod subscription;
pub mod topology;

pub use connection::{BrokerConnection, ConnectionState};
pub use error::RabbitMQError;
pub use local::{LocalExchange, LocalQueue, SettlementLog, Settlements};
pub use publisher::{Message, MessageSink, Publisher, PublisherContext, PublisherDispatcher};
pub use retry::{RetryExhausted, RetryPolicy, retry_fixed};
pub use subscription::{AckMode, Delivery, DeliveryStream, Subscription};
pub use topology::{ExchangeSpec, QueueSpec};

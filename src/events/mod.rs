//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Cross-service event propagation on top of the `rabbitmq` crate.
//
// | Component             | Description                                                    |
// |-----------------------|----------------------------------------------------------------|
// | types                 | `DomainEvent` envelope, event tags, typed payloads, errors     |
// | codec                 | JSON encode / decode of envelopes                              |
// | EventPublisher        | Fire-and-forget publish, skips while disconnected              |
// | EventConsumer         | One consumption task, synchronous dispatch by event type       |
// | DefaultVehicleHandler | USER_CREATED -> placeholder vehicle                            |
//--------------------------------------------------------------------------------------------------

pub mod codec;
mod consumer;
mod handlers;
mod publisher;
pub mod types;

pub use consumer::{ConsumerHandle, ConsumerStats, Disposition, EventConsumer, EventHandler};
pub use handlers::DefaultVehicleHandler;
pub use publisher::{EventPublisher, PublishOutcome};
pub use types::{
    DomainEvent, EventError, EventResult, EventType, UserCreated, VehicleCreated,
};

//! User and vehicle services linked by the `user_events` fanout exchange.
//!
//! Creating a user publishes `USER_CREATED`; vehicle-service consumes it and
//! creates one placeholder vehicle for the new user.

pub mod api;
pub mod config;
pub mod events;
pub mod models;
pub mod service;
pub mod storage;

pub use api::Api;
pub use config::{Config, ConfigError};
pub use events::{DomainEvent, EventConsumer, EventPublisher, EventType, PublishOutcome};

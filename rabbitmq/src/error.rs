/// Error types for RabbitMQ operations
#[derive(Debug, thiserror::Error)]
pub enum RabbitMQError {
    /// Error in the provided URI
    #[error("Provided URI Error: {0}")]
    UriError(String),
    /// Establishing the connection failed on every attempt
    #[error("Connection error after {attempts} attempt(s): {reason}")]
    ConnectionError { attempts: u32, reason: String },
    /// The connection is not in the `Connected` state
    #[error("Not connected to the broker")]
    NotConnected,
    /// Error opening a channel
    #[error("Error while opening a rabbitmq channel: {0}")]
    OpenChannelError(String),
    /// Error declaring a queue
    #[error("Error while declaring a queue: {0}")]
    QueueDeclarationError(String),
    /// Error declaring an exchange
    #[error("Error while declaring a exchange: {0}")]
    ExchangeDeclarationError(String),
    /// Error starting to consume from a subscription
    #[error("Error while starting to consume from a subscription: {0}")]
    SubscriptionError(String),
    /// Error binding a queue to an exchange
    #[error("Error while binding a queue to exchange: {0}")]
    QueueBindingError(String),
    /// Error closing a channel or connection
    #[error("Error while closing a channel: {0}")]
    CloseChannelError(String),
    /// Error publishing a message
    #[error("Error while publishing a message - channel was dropped or closed")]
    PublishError,
    /// Error while acknowledging a message failed
    #[error("Error while acknowledging a message: {0}")]
    AckMessageError(String),
    /// Message does not contain delivery tag
    #[error("Unexpected error: message does not contain delivery tag")]
    NotDeliveryTag,
}

impl RabbitMQError {
    /// Whether the error means the broker was simply not reachable at publish time.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected | Self::PublishError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_mentions_attempts() {
        let err = RabbitMQError::ConnectionError {
            attempts: 5,
            reason: "connection refused".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Connection error after 5 attempt(s): connection refused"
        );
    }

    #[test]
    fn not_connected_classification() {
        assert!(RabbitMQError::NotConnected.is_not_connected());
        assert!(RabbitMQError::PublishError.is_not_connected());
        assert!(!RabbitMQError::NotDeliveryTag.is_not_connected());
    }
}

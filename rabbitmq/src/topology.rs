//! Exchange/queue declarations. Every call here is idempotent on the broker
//! side, so services run them on every startup.

use amqprs::{
    FieldTable, FieldValue, ShortStr,
    channel::{Channel, ExchangeDeclareArguments, QueueBindArguments, QueueDeclareArguments},
};
use tracing::{debug, info};

use crate::error::RabbitMQError;

const FANOUT: &str = "fanout";
const DEAD_LETTER_ARG: &str = "x-dead-letter-exchange";

/// Exchange declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: String,
    pub durable: bool,
}

impl ExchangeSpec {
    /// Durable fanout exchange: every bound queue gets every message
    pub fn fanout(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: FANOUT.to_owned(),
            durable: true,
        }
    }

    fn arguments(&self) -> ExchangeDeclareArguments {
        ExchangeDeclareArguments::new(&self.name, &self.kind)
            .durable(self.durable)
            .finish()
    }
}

/// Queue declaration for a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSpec {
    /// Server-named, exclusive, auto-delete queue private to this process.
    /// Nothing published while the process is down is ever seen.
    Exclusive { dead_letter: Option<String> },
    /// Client-named durable queue that outlives the process and keeps a backlog
    Durable {
        name: String,
        dead_letter: Option<String>,
    },
}

impl QueueSpec {
    pub fn exclusive() -> Self {
        Self::Exclusive { dead_letter: None }
    }

    pub fn durable(name: &str) -> Self {
        Self::Durable {
            name: name.to_owned(),
            dead_letter: None,
        }
    }

    /// Routes rejected messages to `exchange` instead of dropping them
    pub fn with_dead_letter(self, exchange: &str) -> Self {
        let dead_letter = Some(exchange.to_owned());
        match self {
            Self::Exclusive { .. } => Self::Exclusive { dead_letter },
            Self::Durable { name, .. } => Self::Durable { name, dead_letter },
        }
    }

    pub fn dead_letter(&self) -> Option<&str> {
        match self {
            Self::Exclusive { dead_letter } | Self::Durable { dead_letter, .. } => {
                dead_letter.as_deref()
            }
        }
    }

    fn arguments(&self) -> Result<QueueDeclareArguments, RabbitMQError> {
        let mut args = match self {
            Self::Exclusive { .. } => QueueDeclareArguments::exclusive_server_named()
                .auto_delete(true)
                .finish(),
            Self::Durable { name, .. } => QueueDeclareArguments::durable_client_named(name),
        };

        if let Some(exchange) = self.dead_letter() {
            let mut table = FieldTable::new();
            let key = ShortStr::try_from(DEAD_LETTER_ARG)
                .map_err(|err| RabbitMQError::QueueDeclarationError(err.to_string()))?;
            table.insert(key, FieldValue::from(exchange.to_owned()));
            args.arguments(table);
        }

        Ok(args)
    }
}

/// Declares an exchange
///
/// # Errors
/// Returns `RabbitMQError::ExchangeDeclarationError` if the broker refuses the
/// declaration (e.g. an existing exchange with a different type)
pub async fn declare_exchange(channel: &Channel, spec: &ExchangeSpec) -> Result<(), RabbitMQError> {
    channel
        .exchange_declare(spec.arguments())
        .await
        .map_err(|err| RabbitMQError::ExchangeDeclarationError(err.to_string()))?;

    info!("Declared {} exchange {}", spec.kind, spec.name);
    Ok(())
}

/// Declares a queue and returns the name the broker assigned to it
pub async fn declare_queue(channel: &Channel, spec: &QueueSpec) -> Result<String, RabbitMQError> {
    let (queue_name, _, _) = channel
        .queue_declare(spec.arguments()?)
        .await
        .map_err(|err| RabbitMQError::QueueDeclarationError(err.to_string()))?
        .ok_or_else(|| {
            RabbitMQError::QueueDeclarationError("broker returned no queue name".to_owned())
        })?;

    debug!("Declared queue {}", queue_name);
    Ok(queue_name)
}

/// Binds `queue` to `exchange`. Fanout exchanges ignore `routing_key`; pass `""`.
pub async fn bind_queue(
    channel: &Channel,
    queue: &str,
    exchange: &str,
    routing_key: &str,
) -> Result<(), RabbitMQError> {
    let args = QueueBindArguments::new(queue, exchange, routing_key);
    channel
        .queue_bind(args)
        .await
        .map_err(|err| RabbitMQError::QueueBindingError(err.to_string()))?;

    debug!("Bound queue {} to exchange {}", queue, exchange);
    Ok(())
}

/// Declares the dead-letter fanout exchange plus a durable `<exchange>.dead`
/// queue so rejected events stay inspectable
pub async fn declare_dead_letter(channel: &Channel, exchange: &str) -> Result<String, RabbitMQError> {
    declare_exchange(channel, &ExchangeSpec::fanout(exchange)).await?;
    let queue = declare_queue(channel, &QueueSpec::durable(&format!("{exchange}.dead"))).await?;
    bind_queue(channel, &queue, exchange, "").await?;
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_exchange_is_durable() {
        let spec = ExchangeSpec::fanout("user_events");
        assert_eq!(spec.kind, "fanout");
        assert!(spec.durable);
    }

    #[test]
    fn dead_letter_survives_builder() {
        let exclusive = QueueSpec::exclusive().with_dead_letter("user_events.dlx");
        assert_eq!(exclusive.dead_letter(), Some("user_events.dlx"));

        let durable = QueueSpec::durable("vehicle-service").with_dead_letter("dlx");
        assert_eq!(
            durable,
            QueueSpec::Durable {
                name: "vehicle-service".to_owned(),
                dead_letter: Some("dlx".to_owned()),
            }
        );
        assert_eq!(QueueSpec::exclusive().dead_letter(), None);
    }

    #[test]
    fn exclusive_queue_is_auto_delete() {
        let args = format!("{:?}", QueueSpec::exclusive().arguments().unwrap());
        assert!(args.contains("exclusive: true"), "{args}");
        assert!(args.contains("auto_delete: true"), "{args}");

        let args = format!(
            "{:?}",
            QueueSpec::durable("vehicle-service").arguments().unwrap()
        );
        assert!(args.contains("durable: true"), "{args}");
        assert!(args.contains("auto_delete: false"), "{args}");
    }

    #[test]
    fn dead_letter_is_passed_as_queue_argument() {
        let args = QueueSpec::exclusive()
            .with_dead_letter("user_events.dlx")
            .arguments()
            .unwrap();
        let rendered = format!("{:?}", args);
        assert!(rendered.contains("x-dead-letter-exchange"), "{rendered}");
        assert!(rendered.contains("user_events.dlx"), "{rendered}");
    }
}

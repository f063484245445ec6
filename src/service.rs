//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Startup and shutdown sequences of the two services. Each service owns one BrokerConnection:
// it is opened before anything else (startup aborts if the broker stays unreachable), handed to
// the publisher and consumer, and closed after the HTTP server has drained.
//
// | Function              | Description                                                  |
// |-----------------------|--------------------------------------------------------------|
// | run_user_service      | user-service: users table + USER_CREATED publisher           |
// | run_vehicle_service   | vehicle-service: vehicles table + USER_CREATED consumer      |
// | user_events_consumer  | EventConsumer with the placeholder vehicle handler           |
// | consumer_queue        | Queue declaration derived from configuration                 |
// | shutdown_signal       | Resolves on Ctrl+C                                           |
//--------------------------------------------------------------------------------------------------

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use rabbitmq::{
    AckMode, BrokerConnection, ExchangeSpec, Publisher, QueueSpec, RetryPolicy, Subscription,
    topology,
};
use tracing::{error, info, warn};

use crate::{
    api::{Api, AuthKeys, UserState, VehicleState, cors_layer, user_routes, vehicle_routes},
    config::Config,
    events::{DefaultVehicleHandler, EventConsumer, EventPublisher, codec},
    storage::{
        MemoryUserStore, MemoryVehicleStore, PgUserStore, PgVehicleStore, UserStore,
        VehicleStore, connect_pool,
    },
};

/// Command line overrides shared by both binaries
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub port: Option<u16>,
    /// Keep rows in memory instead of Postgres
    pub in_memory: bool,
}

pub fn user_events_consumer(store: Arc<dyn VehicleStore>) -> EventConsumer {
    EventConsumer::new().register(Arc::new(DefaultVehicleHandler::new(store)))
}

/// Exclusive server-named queue unless `CONSUMER_QUEUE` names a durable one.
/// Manual ack mode routes rejected events to the dead-letter exchange.
pub fn consumer_queue(config: &Config) -> QueueSpec {
    let queue = match &config.consumer_queue {
        Some(name) => QueueSpec::durable(name),
        None => QueueSpec::exclusive(),
    };
    match config.consumer_ack_mode {
        AckMode::Manual => queue.with_dead_letter(&config.user_events_dead_letter()),
        AckMode::Auto => queue,
    }
}

pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn open_broker(config: &Config) -> anyhow::Result<BrokerConnection> {
    let connection = BrokerConnection::open(&config.rabbit_url, &config.app_id, RetryPolicy::default())
        .await
        .context("RabbitMQ unreachable, aborting startup")?;

    let mut states = connection.subscribe_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            warn!("RabbitMQ connection is now {:?}", state);
        }
    });

    Ok(connection)
}

/// Declares `exchange` and starts a JSON publisher on it
async fn event_publisher(
    connection: &BrokerConnection,
    exchange: &str,
) -> anyhow::Result<(Publisher, EventPublisher)> {
    let channel = connection.require_channel()?;
    topology::declare_exchange(&channel, &ExchangeSpec::fanout(exchange)).await?;

    let publisher = Publisher::new(connection.clone(), exchange).with_content_type(codec::CONTENT_TYPE);
    let events = EventPublisher::new(Arc::new(publisher.get_dispatcher()));
    Ok((publisher, events))
}

fn database_url(config: &Config) -> anyhow::Result<&str> {
    match config.database_url.as_deref() {
        Some(url) => Ok(url),
        None => bail!("DATABASE_URL or DB_USER/DB_HOST/DB_NAME must be set (or pass --in-memory)"),
    }
}

async fn user_store(config: &Config, in_memory: bool) -> anyhow::Result<Arc<dyn UserStore>> {
    if in_memory {
        info!("using in-memory user store");
        return Ok(Arc::new(MemoryUserStore::new()));
    }
    let pool = connect_pool(database_url(config)?).await?;
    let store = PgUserStore::new(pool);
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

async fn vehicle_store(config: &Config, in_memory: bool) -> anyhow::Result<Arc<dyn VehicleStore>> {
    if in_memory {
        info!("using in-memory vehicle store");
        return Ok(Arc::new(MemoryVehicleStore::new()));
    }
    let pool = connect_pool(database_url(config)?).await?;
    let store = PgVehicleStore::new(pool);
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

pub async fn run_user_service(config: Config, options: ServiceOptions) -> anyhow::Result<()> {
    let connection = open_broker(&config).await?;
    let (publisher, events) = event_publisher(&connection, &config.user_events_exchange).await?;

    let store = user_store(&config, options.in_memory).await?;
    let auth = Arc::new(AuthKeys::new(&config.jwt_secret));
    let state = Arc::new(UserState::new(store, events, auth));

    let port = options.port.unwrap_or(config.user_service_port);
    let api = Api::new(
        SocketAddr::from(([0, 0, 0, 0], port)),
        user_routes(state),
        cors_layer(&config.frontend_url)?,
    );
    api.serve(shutdown_signal()).await?;

    publisher.close().await;
    connection.close().await?;
    info!("user-service stopped");
    Ok(())
}

pub async fn run_vehicle_service(config: Config, options: ServiceOptions) -> anyhow::Result<()> {
    let connection = open_broker(&config).await?;
    let (publisher, events) =
        event_publisher(&connection, &config.vehicle_events_exchange).await?;

    let store = vehicle_store(&config, options.in_memory).await?;

    let subscription = Subscription::bind(
        &connection,
        &ExchangeSpec::fanout(&config.user_events_exchange),
        &consumer_queue(&config),
        config.consumer_ack_mode,
    )
    .await?;
    info!(
        "consuming {} from queue {}",
        subscription.exchange_name(),
        subscription.rabbit_queue_name()
    );
    let consumer = user_events_consumer(store.clone()).spawn(subscription);

    let auth = Arc::new(AuthKeys::new(&config.jwt_secret));
    let state = Arc::new(VehicleState::new(store, Some(events), auth));

    let port = options.port.unwrap_or(config.vehicle_service_port);
    let api = Api::new(
        SocketAddr::from(([0, 0, 0, 0], port)),
        vehicle_routes(state),
        cors_layer(&config.frontend_url)?,
    );
    api.serve(shutdown_signal()).await?;

    let stats = consumer.stats();
    consumer.stop().await;
    info!("event consumer stopped: {:?}", stats);
    publisher.close().await;
    connection.close().await?;
    info!("vehicle-service stopped");
    Ok(())
}

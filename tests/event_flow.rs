//--------------------------------------------------------------------------------------------------
// TEST MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Cross-service event propagation: user-service publishes on `user_events`, vehicle-service
// consumes and creates placeholder vehicles. Both sides share an in-process fanout exchange.
//--------------------------------------------------------------------------------------------------

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use rabbitmq::{AckMode, DeliveryStream, LocalExchange, Message, MessageSink, PublisherContext};
use serde_json::{Map, Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use fleet_platform::{
    DomainEvent, EventPublisher, EventType,
    api::{AuthKeys, UserState, user_routes},
    events::{UserCreated, codec},
    models::User,
    service::user_events_consumer,
    storage::{MemoryUserStore, MemoryVehicleStore, VehicleStore},
};

/// Polls `check` until it holds or two seconds pass
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within the wait window");
}

fn user(id: i32, email: &str) -> User {
    User {
        id,
        email: email.to_string(),
        name: "A".to_string(),
        created_at: Utc::now(),
    }
}

fn publish_raw(exchange: &LocalExchange, body: &[u8]) {
    exchange
        .publish(Message::from(body), PublisherContext::new("test", None))
        .unwrap();
}

#[tokio::test]
async fn creating_a_user_creates_exactly_one_placeholder_vehicle() {
    // Setup
    let exchange = LocalExchange::new("user_events");
    let vehicles = Arc::new(MemoryVehicleStore::new());
    let consumer = user_events_consumer(vehicles.clone()).spawn(exchange.bind(AckMode::Manual));

    let keys = Arc::new(AuthKeys::new("test-secret").with_hash_cost(4));
    let router = user_routes(Arc::new(UserState::new(
        Arc::new(MemoryUserStore::new()),
        EventPublisher::new(Arc::new(exchange.clone())),
        keys.clone(),
    )));
    let token = keys.issue(&user(1000, "ops@x.com")).unwrap();

    // Execute
    let request = Request::builder()
        .method("POST")
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(
            json!({ "email": "a@x.com", "name": "A", "password": "secret1" }).to_string(),
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let created: Value = serde_json::from_slice(&body).unwrap();
    let user_id = created["id"].as_i64().unwrap() as i32;

    // Verify
    eventually(|| {
        let vehicles = vehicles.clone();
        async move { !vehicles.list_vehicles(Some(user_id)).await.unwrap().is_empty() }
    })
    .await;

    // Let any duplicate surface before counting
    tokio::time::sleep(Duration::from_millis(50)).await;
    let owned = vehicles.list_vehicles(Some(user_id)).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].make, "Unknown");
    assert_eq!(owned[0].model, "Unknown");
    assert_eq!(owned[0].year, None);
    assert_eq!(owned[0].user_id, user_id);
    assert_eq!(consumer.stats().handled, 1);

    consumer.stop().await;
}

#[tokio::test]
async fn only_consumers_bound_before_publish_receive_the_event() {
    // Setup
    let exchange = LocalExchange::new("user_events");
    let publisher = EventPublisher::new(Arc::new(exchange.clone()));
    let mut early = exchange.bind(AckMode::Auto);

    // Execute
    assert!(publisher.publish(&DomainEvent::user_created(&user(7, "b@x.com"))).is_published());
    let mut late = exchange.bind(AckMode::Auto);

    // Verify
    let delivery = early.receive().await.unwrap();
    let payload: UserCreated = codec::decode(&delivery.content).unwrap().payload().unwrap();
    assert_eq!(
        payload,
        UserCreated {
            id: 7,
            email: "b@x.com".to_string()
        }
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(50), early.receive())
            .await
            .is_err(),
        "exactly one event"
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(50), late.receive())
            .await
            .is_err(),
        "no replay to late consumers"
    );
}

#[tokio::test]
async fn malformed_message_does_not_stop_the_consumer() {
    // Setup
    let exchange = LocalExchange::new("user_events");
    let queue = exchange.bind(AckMode::Manual);
    let settlements = queue.settlements();
    let vehicles = Arc::new(MemoryVehicleStore::new());
    let consumer = user_events_consumer(vehicles.clone()).spawn(queue);
    let publisher = EventPublisher::new(Arc::new(exchange.clone()));

    // Execute
    publish_raw(&exchange, b"\x00\x01 definitely not json");
    publisher.publish(&DomainEvent::user_created(&user(3, "c@x.com")));

    // Verify
    eventually(|| {
        let vehicles = vehicles.clone();
        async move { vehicles.list_vehicles(Some(3)).await.unwrap().len() == 1 }
    })
    .await;
    let stats = consumer.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.handled, 1);
    assert!(!consumer.is_finished());

    let settled = settlements.snapshot();
    assert_eq!(settled.rejected.len(), 1);
    assert_eq!(settled.acked.len(), 1);

    consumer.stop().await;
}

#[tokio::test]
async fn unknown_event_types_are_ignored() {
    // Setup
    let exchange = LocalExchange::new("user_events");
    let vehicles = Arc::new(MemoryVehicleStore::new());
    let consumer = user_events_consumer(vehicles.clone()).spawn(exchange.bind(AckMode::Auto));

    // Execute
    publish_raw(&exchange, br#"{"type":"USER_ARCHIVED","data":{"id":1,"email":"a@x.com"}}"#);
    publish_raw(&exchange, br#"{"type":"SOMETHING_ELSE","data":{}}"#);

    // Verify
    eventually(|| async { consumer.stats().total() == 2 }).await;
    let stats = consumer.stats();
    assert_eq!(stats.ignored, 2);
    assert_eq!(stats.failed, 0);
    assert!(vehicles.list_vehicles(None).await.unwrap().is_empty());

    consumer.stop().await;
}

#[tokio::test]
async fn handler_failure_is_rejected_and_consumption_continues() {
    // Setup
    let exchange = LocalExchange::new("user_events");
    let queue = exchange.bind(AckMode::Manual);
    let settlements = queue.settlements();
    let vehicles = Arc::new(MemoryVehicleStore::new());
    let consumer = user_events_consumer(vehicles.clone()).spawn(queue);

    // Execute: USER_CREATED whose payload cannot be applied, then a good one
    publish_raw(&exchange, br#"{"type":"USER_CREATED","data":{"email":"no-id@x.com"}}"#);
    EventPublisher::new(Arc::new(exchange.clone()))
        .publish(&DomainEvent::user_created(&user(9, "d@x.com")));

    // Verify
    eventually(|| async { consumer.stats().total() == 2 }).await;
    assert_eq!(consumer.stats().failed, 1);
    assert_eq!(settlements.snapshot().rejected.len(), 1);
    assert_eq!(vehicles.list_vehicles(None).await.unwrap().len(), 1);

    consumer.stop().await;
}

#[tokio::test]
async fn envelopes_survive_the_wire() {
    let mut data = Map::new();
    data.insert("id".to_string(), json!(12));
    data.insert("make".to_string(), json!("Volvo"));
    data.insert("model".to_string(), json!("XC90"));
    data.insert("year".to_string(), Value::Null);
    data.insert("user_id".to_string(), json!(4));

    let events = [
        DomainEvent::user_created(&user(1, "a@x.com")),
        DomainEvent::new(EventType::VehicleCreated, data),
        DomainEvent::new(EventType::UserCreated, Map::new()),
    ];
    for event in events {
        assert_eq!(codec::decode(&codec::encode(&event).unwrap()).unwrap(), event);
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::{
    consumer::EventHandler,
    types::{DomainEvent, EventError, EventResult, EventType, UserCreated},
};
use crate::{models::NewVehicle, storage::VehicleStore};

/// Gives every newly created user a placeholder vehicle
///
/// Not idempotent: a redelivered `USER_CREATED` creates a second vehicle.
pub struct DefaultVehicleHandler {
    store: Arc<dyn VehicleStore>,
}

impl DefaultVehicleHandler {
    pub fn new(store: Arc<dyn VehicleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for DefaultVehicleHandler {
    fn event_types(&self) -> Vec<EventType> {
        vec![EventType::UserCreated]
    }

    async fn handle_event(&self, event: &DomainEvent) -> EventResult<()> {
        let user: UserCreated = event.payload()?;

        match self.store.insert_vehicle(NewVehicle::placeholder(user.id)).await {
            Ok(vehicle) => {
                info!(
                    "created placeholder vehicle {} for user {} ({})",
                    vehicle.id, user.id, user.email
                );
                Ok(())
            }
            Err(err) => {
                error!("placeholder vehicle for user {} not created: {}", user.id, err);
                Err(EventError::Handler(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::Vehicle,
        storage::{MockVehicleStore, StoreError},
    };
    use chrono::Utc;
    use serde_json::{Map, json};

    fn user_created(id: i32) -> DomainEvent {
        let mut data = Map::new();
        data.insert("id".to_owned(), json!(id));
        data.insert("email".to_owned(), json!("a@x.com"));
        DomainEvent::new(EventType::UserCreated, data)
    }

    #[tokio::test]
    async fn inserts_placeholder_for_user() {
        let mut store = MockVehicleStore::new();
        store
            .expect_insert_vehicle()
            .withf(|vehicle| *vehicle == NewVehicle::placeholder(5))
            .times(1)
            .returning(|vehicle| {
                Ok(Vehicle {
                    id: 1,
                    make: vehicle.make,
                    model: vehicle.model,
                    year: vehicle.year,
                    user_id: vehicle.user_id,
                    created_at: Utc::now(),
                })
            });

        let handler = DefaultVehicleHandler::new(Arc::new(store));
        handler.handle_event(&user_created(5)).await.unwrap();
    }

    #[tokio::test]
    async fn store_failure_becomes_handler_error() {
        let mut store = MockVehicleStore::new();
        store
            .expect_insert_vehicle()
            .returning(|_| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));

        let handler = DefaultVehicleHandler::new(Arc::new(store));
        let err = handler.handle_event(&user_created(5)).await.unwrap_err();
        assert!(matches!(err, EventError::Handler(_)));
    }

    #[tokio::test]
    async fn bad_payload_never_touches_store() {
        let mut store = MockVehicleStore::new();
        store.expect_insert_vehicle().never();

        let handler = DefaultVehicleHandler::new(Arc::new(store));
        let event = DomainEvent::new(EventType::UserCreated, Map::new());
        assert!(matches!(
            handler.handle_event(&event).await,
            Err(EventError::Payload { .. })
        ));
    }
}

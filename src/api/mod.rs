//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// REST APIs of the two services, built on Axum.
//
// | Component      | Description                                                |
// |----------------|------------------------------------------------------------|
// | users          | /users CRUD and /login of user-service                     |
// | vehicles       | /vehicles CRUD of vehicle-service                          |
// | auth           | JWT issue/verify, password hashing, AuthUser extractor     |
// | DTOs           | Data transfer objects for API requests/responses           |
//
//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name           | Description                                       | Key Methods       |
// |----------------|---------------------------------------------------|-------------------|
// | UserState      | Shared state of user-service handlers             | new               |
// | VehicleState   | Shared state of vehicle-service handlers          | new               |
// | Api            | Router plus listen address                        | serve             |
//--------------------------------------------------------------------------------------------------

pub mod auth;
mod dto;
mod error;
mod users;
mod vehicles;

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{
    Extension, Json, Router,
    http::{HeaderValue, Method, header},
    response::IntoResponse,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    events::EventPublisher,
    storage::{UserStore, VehicleStore},
};

pub use auth::{AuthError, AuthKeys, AuthUser, Claims};
pub use dto::*;
pub use error::{ApiError, ApiResult};

/// Shared state of user-service handlers
pub struct UserState {
    pub store: Arc<dyn UserStore>,
    /// Publisher on `user_events`
    pub events: EventPublisher,
    pub auth: Arc<AuthKeys>,
}

impl UserState {
    pub fn new(store: Arc<dyn UserStore>, events: EventPublisher, auth: Arc<AuthKeys>) -> Self {
        Self {
            store,
            events,
            auth,
        }
    }
}

/// Shared state of vehicle-service handlers
pub struct VehicleState {
    pub store: Arc<dyn VehicleStore>,
    /// Publisher on `vehicle_events`, if one is wired
    pub events: Option<EventPublisher>,
    pub auth: Arc<AuthKeys>,
}

impl VehicleState {
    pub fn new(
        store: Arc<dyn VehicleStore>,
        events: Option<EventPublisher>,
        auth: Arc<AuthKeys>,
    ) -> Self {
        Self {
            store,
            events,
            auth,
        }
    }
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

pub fn user_routes(state: Arc<UserState>) -> Router {
    let auth = state.auth.clone();
    Router::new()
        .route("/health", get(health))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/login", axum::routing::post(users::login))
        // Attach application state
        .layer(Extension(state))
        .layer(Extension(auth))
}

pub fn vehicle_routes(state: Arc<VehicleState>) -> Router {
    let auth = state.auth.clone();
    Router::new()
        .route("/health", get(health))
        .route(
            "/vehicles",
            get(vehicles::list_vehicles).post(vehicles::create_vehicle),
        )
        .route(
            "/vehicles/:id",
            get(vehicles::get_vehicle)
                .put(vehicles::update_vehicle)
                .delete(vehicles::delete_vehicle),
        )
        .layer(Extension(state))
        .layer(Extension(auth))
}

/// CORS policy admitting the frontend origin
pub fn cors_layer(frontend_url: &str) -> Result<CorsLayer, ApiError> {
    let origin = frontend_url
        .parse::<HeaderValue>()
        .map_err(|err| ApiError::BadRequest(format!("invalid FRONTEND_URL: {}", err)))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]))
}

/// Router plus the address it is served on
pub struct Api {
    addr: SocketAddr,
    router: Router,
}

impl Api {
    pub fn new(addr: SocketAddr, routes: Router, cors: CorsLayer) -> Self {
        let router = routes.layer(cors).layer(TraceLayer::new_for_http());
        Self { addr, router }
    }

    pub fn routes(&self) -> Router {
        self.router.clone()
    }

    /// Serves until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!("API listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

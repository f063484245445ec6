use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{
    ApiError, ApiResult, VehicleState,
    auth::AuthUser,
    dto::{CreateVehicleRequest, UpdateVehicleRequest, VehicleQuery},
};
use crate::{events::DomainEvent, models::VehicleId};

fn vehicle_not_found() -> ApiError {
    ApiError::NotFound("Vehicle not found".to_string())
}

pub async fn create_vehicle(
    Extension(state): Extension<Arc<VehicleState>>,
    _caller: AuthUser,
    body: Result<Json<CreateVehicleRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let vehicle = state.store.insert_vehicle(req).await?;

    if let Some(events) = &state.events {
        events.publish(&DomainEvent::vehicle_created(&vehicle));
    }

    Ok((StatusCode::CREATED, Json(vehicle)).into_response())
}

pub async fn list_vehicles(
    Extension(state): Extension<Arc<VehicleState>>,
    Query(query): Query<VehicleQuery>,
) -> ApiResult<Response> {
    let vehicles = state.store.list_vehicles(query.user_id).await?;
    Ok(Json(vehicles).into_response())
}

pub async fn get_vehicle(
    Extension(state): Extension<Arc<VehicleState>>,
    Path(id): Path<VehicleId>,
) -> ApiResult<Response> {
    let vehicle = state
        .store
        .find_vehicle(id)
        .await?
        .ok_or_else(vehicle_not_found)?;
    Ok(Json(vehicle).into_response())
}

pub async fn update_vehicle(
    Extension(state): Extension<Arc<VehicleState>>,
    _caller: AuthUser,
    Path(id): Path<VehicleId>,
    body: Result<Json<UpdateVehicleRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(changes) = body?;
    let vehicle = state
        .store
        .update_vehicle(id, changes)
        .await?
        .ok_or_else(vehicle_not_found)?;
    Ok(Json(vehicle).into_response())
}

/// 204 whether or not the vehicle existed
pub async fn delete_vehicle(
    Extension(state): Extension<Arc<VehicleState>>,
    _caller: AuthUser,
    Path(id): Path<VehicleId>,
) -> ApiResult<Response> {
    state.store.delete_vehicle(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                                       | Used by          |
// |-----------------------|---------------------------------------------------|------------------|
// | CreateUserRequest     | Body of POST /users                               | user-service     |
// | UpdateUserRequest     | Body of PUT /users/:id, every field optional      | user-service     |
// | LoginRequest          | Body of POST /login                               | user-service     |
// | LoginResponse         | Token plus the logged in user                     | user-service     |
// | MessageResponse       | `{ "message": ... }`                              | user-service     |
// | VehicleQuery          | `?user_id=` filter of GET /vehicles               | vehicle-service  |
// | CreateVehicleRequest  | Body of POST /vehicles                            | vehicle-service  |
// | UpdateVehicleRequest  | Body of PUT /vehicles/:id, every field optional   | vehicle-service  |
//--------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::models::{NewVehicle, User, UserId, VehicleChanges};

/// Fields are optional so that missing ones surface as 400 with a message
/// instead of a deserialization rejection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleQuery {
    pub user_id: Option<UserId>,
}

pub type CreateVehicleRequest = NewVehicle;
pub type UpdateVehicleRequest = VehicleChanges;

/// Treats blank strings like absent ones
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

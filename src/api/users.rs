//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                            | Return Type         |
// |-----------------------|----------------------------------------|---------------------|
// | create_user           | Insert a user and announce it          | ApiResult<Response> |
// | list_users            | All users ordered by id                | ApiResult<Response> |
// | get_user              | One user                               | ApiResult<Response> |
// | update_user           | Partial update                         | ApiResult<Response> |
// | delete_user           | Delete a user                          | ApiResult<Response> |
// | login                 | Check a password and issue a JWT       | ApiResult<Response> |
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum::extract::rejection::JsonRejection;
use tracing::info;

use super::{
    ApiError, ApiResult, UserState,
    auth::{AuthError, AuthUser},
    dto::{CreateUserRequest, LoginRequest, LoginResponse, MessageResponse, UpdateUserRequest, present},
};
use crate::{
    events::DomainEvent,
    models::{NewUser, UserChanges, UserId},
};

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// Inserts the user, then publishes `USER_CREATED`. The response never depends
/// on whether the event made it to the broker.
pub async fn create_user(
    Extension(state): Extension<Arc<UserState>>,
    AuthUser(caller): AuthUser,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let password = present(req.password)
        .ok_or_else(|| ApiError::BadRequest("Password is required".to_string()))?;
    let email = present(req.email)
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    let password_hash = state.auth.hash_password(&password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            email,
            name: req.name.unwrap_or_default(),
            password_hash,
        })
        .await?;
    info!("user {} created by {}", user.id, caller.id);

    state.events.publish(&DomainEvent::user_created(&user));

    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub async fn list_users(Extension(state): Extension<Arc<UserState>>) -> ApiResult<Response> {
    let users = state.store.list_users().await?;
    Ok(Json(users).into_response())
}

pub async fn get_user(
    Extension(state): Extension<Arc<UserState>>,
    Path(id): Path<UserId>,
) -> ApiResult<Response> {
    let user = state.store.find_user(id).await?.ok_or_else(user_not_found)?;
    Ok(Json(user).into_response())
}

pub async fn update_user(
    Extension(state): Extension<Arc<UserState>>,
    _caller: AuthUser,
    Path(id): Path<UserId>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let password_hash = match present(req.password) {
        Some(password) => Some(state.auth.hash_password(&password).await?),
        None => None,
    };
    let changes = UserChanges {
        email: present(req.email),
        name: req.name,
        password_hash,
    };

    let user = state
        .store
        .update_user(id, changes)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(user).into_response())
}

pub async fn delete_user(
    Extension(state): Extension<Arc<UserState>>,
    _caller: AuthUser,
    Path(id): Path<UserId>,
) -> ApiResult<Response> {
    state.store.delete_user(id).await?.ok_or_else(user_not_found)?;
    Ok(Json(MessageResponse {
        message: "User deleted".to_string(),
    })
    .into_response())
}

pub async fn login(
    Extension(state): Extension<Arc<UserState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
        return Err(ApiError::BadRequest("Email and password required".to_string()));
    };

    let credentials = state
        .store
        .find_credentials(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    state
        .auth
        .verify_password(&password, &credentials.password_hash)
        .await?;

    let user = credentials.into_user();
    let token = state.auth.issue(&user)?;
    Ok(Json(LoginResponse { token, user }).into_response())
}

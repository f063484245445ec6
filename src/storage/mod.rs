//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Storage collaborators. Each service owns exactly one table and talks to it only through the
// trait below, so handlers and event processing run unchanged against Postgres or memory.
//
// | Name                  | Description                                       | Backend          |
// |-----------------------|---------------------------------------------------|------------------|
// | UserStore             | CRUD over users + credential lookup               | trait            |
// | VehicleStore          | CRUD over vehicles + owner filter                 | trait            |
// | PgUserStore           | `users` table                                     | sqlx / Postgres  |
// | PgVehicleStore        | `vehicles` table                                  | sqlx / Postgres  |
// | MemoryUserStore       | Ordered map behind a RwLock                       | memory           |
// | MemoryVehicleStore    | Ordered map behind a RwLock                       | memory           |
//--------------------------------------------------------------------------------------------------

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Credentials, NewUser, NewVehicle, User, UserChanges, UserId, Vehicle, VehicleChanges,
    VehicleId,
};

pub use memory::{MemoryUserStore, MemoryVehicleStore};
pub use postgres::{PgUserStore, PgVehicleStore, connect_pool};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    /// All users ordered by id
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<Credentials>>;

    /// Applies the fields that are set; `None` when the user does not exist
    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<Option<User>>;

    /// Returns the deleted row, `None` when nothing matched
    async fn delete_user(&self, id: UserId) -> StoreResult<Option<User>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn insert_vehicle(&self, vehicle: NewVehicle) -> StoreResult<Vehicle>;

    /// Vehicles ordered by id, restricted to one owner when `user_id` is set
    async fn list_vehicles(&self, user_id: Option<UserId>) -> StoreResult<Vec<Vehicle>>;

    async fn find_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>>;

    async fn update_vehicle(
        &self,
        id: VehicleId,
        changes: VehicleChanges,
    ) -> StoreResult<Option<Vehicle>>;

    async fn delete_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>>;
}

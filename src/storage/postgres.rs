use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use super::{StoreError, StoreResult, UserStore, VehicleStore};
use crate::models::{
    Credentials, NewUser, NewVehicle, User, UserChanges, UserId, Vehicle, VehicleChanges,
    VehicleId,
};

const MAX_CONNECTIONS: u32 = 5;

pub async fn connect_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

fn map_unique(err: sqlx::Error, email: &str) -> StoreError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::DuplicateEmail(email.to_owned()),
        _ => StoreError::Database(err),
    }
}

const USER_COLUMNS: &str = "id, email, COALESCE(name, '') AS name, created_at";

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `users` table if it is missing
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            SERIAL PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                name          TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        info!("users table ready");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| map_unique(err, &user.email))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, Credentials>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<Option<User>> {
        let email = changes.email.clone().unwrap_or_default();
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE($1, email),
                name = COALESCE($2, name),
                password_hash = COALESCE($3, password_hash)
            WHERE id = $4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(changes.email)
        .bind(changes.name)
        .bind(changes.password_hash)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_unique(err, &email))
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

const VEHICLE_COLUMNS: &str = "id, make, model, year, user_id, created_at";

pub struct PgVehicleStore {
    pool: PgPool,
}

impl PgVehicleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `vehicles` table if it is missing. `user_id` points into
    /// another service's database, so there is no foreign key.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vehicles (
                id         SERIAL PRIMARY KEY,
                make       TEXT NOT NULL,
                model      TEXT NOT NULL,
                year       INTEGER,
                user_id    INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        info!("vehicles table ready");
        Ok(())
    }
}

#[async_trait]
impl VehicleStore for PgVehicleStore {
    async fn insert_vehicle(&self, vehicle: NewVehicle) -> StoreResult<Vehicle> {
        let row = sqlx::query_as::<_, Vehicle>(&format!(
            "INSERT INTO vehicles (make, model, year, user_id) VALUES ($1, $2, $3, $4) RETURNING {VEHICLE_COLUMNS}"
        ))
        .bind(vehicle.make)
        .bind(vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_vehicles(&self, user_id: Option<UserId>) -> StoreResult<Vec<Vehicle>> {
        let rows = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE ($1::INTEGER IS NULL OR user_id = $1) ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_vehicle(
        &self,
        id: VehicleId,
        changes: VehicleChanges,
    ) -> StoreResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, Vehicle>(&format!(
            r#"
            UPDATE vehicles SET
                make = COALESCE($1, make),
                model = COALESCE($2, model),
                year = CASE WHEN $3 THEN $4 ELSE year END,
                user_id = COALESCE($5, user_id)
            WHERE id = $6
            RETURNING {VEHICLE_COLUMNS}
            "#
        ))
        .bind(changes.make)
        .bind(changes.model)
        .bind(changes.year.is_some())
        .bind(changes.year.flatten())
        .bind(changes.user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, Vehicle>(&format!(
            "DELETE FROM vehicles WHERE id = $1 RETURNING {VEHICLE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{StoreError, StoreResult, UserStore, VehicleStore};
use crate::models::{
    Credentials, NewUser, NewVehicle, User, UserChanges, UserId, Vehicle, VehicleChanges,
    VehicleId,
};

#[derive(Default)]
struct UserTable {
    next_id: UserId,
    rows: BTreeMap<UserId, Credentials>,
}

/// Users kept in process memory, ids assigned from 1 like a SERIAL column
#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|row| row.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }

        table.next_id += 1;
        let row = Credentials {
            id: table.next_id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        table.rows.insert(row.id, row.clone());
        Ok(row.into_user())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let table = self.table.read().await;
        Ok(table.rows.values().cloned().map(Credentials::into_user).collect())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned().map(Credentials::into_user))
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<Credentials>> {
        let table = self.table.read().await;
        Ok(table.rows.values().find(|row| row.email == email).cloned())
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut table = self.table.write().await;
        if let Some(email) = &changes.email {
            if table
                .rows
                .values()
                .any(|row| row.id != id && &row.email == email)
            {
                return Err(StoreError::DuplicateEmail(email.clone()));
            }
        }

        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            row.email = email;
        }
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        Ok(Some(row.clone().into_user()))
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let mut table = self.table.write().await;
        Ok(table.rows.remove(&id).map(Credentials::into_user))
    }
}

#[derive(Default)]
struct VehicleTable {
    next_id: VehicleId,
    rows: BTreeMap<VehicleId, Vehicle>,
}

#[derive(Default)]
pub struct MemoryVehicleStore {
    table: RwLock<VehicleTable>,
}

impl MemoryVehicleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleStore for MemoryVehicleStore {
    async fn insert_vehicle(&self, vehicle: NewVehicle) -> StoreResult<Vehicle> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let row = Vehicle {
            id: table.next_id,
            make: vehicle.make,
            model: vehicle.model,
            year: vehicle.year,
            user_id: vehicle.user_id,
            created_at: Utc::now(),
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_vehicles(&self, user_id: Option<UserId>) -> StoreResult<Vec<Vehicle>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|row| user_id.is_none_or(|owner| row.user_id == owner))
            .cloned()
            .collect())
    }

    async fn find_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update_vehicle(
        &self,
        id: VehicleId,
        changes: VehicleChanges,
    ) -> StoreResult<Option<Vehicle>> {
        let mut table = self.table.write().await;
        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(make) = changes.make {
            row.make = make;
        }
        if let Some(model) = changes.model {
            row.model = model;
        }
        if let Some(year) = changes.year {
            row.year = year;
        }
        if let Some(user_id) = changes.user_id {
            row.user_id = user_id;
        }
        Ok(Some(row.clone()))
    }

    async fn delete_vehicle(&self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        Ok(self.table.write().await.rows.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_owned(),
            name: "A".to_owned(),
            password_hash: "hash".to_owned(),
        }
    }

    #[tokio::test]
    async fn users_are_listed_in_id_order() {
        let store = MemoryUserStore::new();
        let a = store.insert_user(new_user("a@x.com")).await.unwrap();
        let b = store.insert_user(new_user("b@x.com")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let ids: Vec<_> = store.list_users().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert_user(new_user("a@x.com")).await.unwrap();
        let err = store.insert_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn partial_update_keeps_unset_fields() {
        let store = MemoryUserStore::new();
        let user = store.insert_user(new_user("a@x.com")).await.unwrap();

        let changes = UserChanges {
            name: Some("Renamed".to_owned()),
            ..Default::default()
        };
        let updated = store.update_user(user.id, changes).await.unwrap().unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.email, "a@x.com");

        let creds = store.find_credentials("a@x.com").await.unwrap().unwrap();
        assert_eq!(creds.password_hash, "hash");

        assert!(store.update_user(99, UserChanges::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn vehicles_filter_by_owner() {
        let store = MemoryVehicleStore::new();
        store.insert_vehicle(NewVehicle::placeholder(1)).await.unwrap();
        store.insert_vehicle(NewVehicle::placeholder(2)).await.unwrap();
        store.insert_vehicle(NewVehicle::placeholder(1)).await.unwrap();

        assert_eq!(store.list_vehicles(None).await.unwrap().len(), 3);
        let owned = store.list_vehicles(Some(1)).await.unwrap();
        assert_eq!(owned.len(), 2);
        assert!(owned.iter().all(|v| v.user_id == 1));
    }

    #[tokio::test]
    async fn delete_returns_removed_row_once() {
        let store = MemoryVehicleStore::new();
        let vehicle = store.insert_vehicle(NewVehicle::placeholder(1)).await.unwrap();
        assert_eq!(store.delete_vehicle(vehicle.id).await.unwrap(), Some(vehicle.clone()));
        assert_eq!(store.delete_vehicle(vehicle.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn vehicle_year_can_be_cleared() {
        let store = MemoryVehicleStore::new();
        let vehicle = store.insert_vehicle(NewVehicle::placeholder(1)).await.unwrap();

        let set = VehicleChanges {
            year: Some(Some(2020)),
            ..Default::default()
        };
        let updated = store.update_vehicle(vehicle.id, set).await.unwrap().unwrap();
        assert_eq!(updated.year, Some(2020));

        let untouched = store
            .update_vehicle(vehicle.id, VehicleChanges::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.year, Some(2020));

        let clear = VehicleChanges {
            year: Some(None),
            ..Default::default()
        };
        let cleared = store.update_vehicle(vehicle.id, clear).await.unwrap().unwrap();
        assert_eq!(cleared.year, None);
    }
}

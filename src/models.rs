//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                          | Owned by         |
// |-----------------|------------------------------------------------------|------------------|
// | User            | Registered account, password hash never serialized   | user-service     |
// | NewUser         | Insert payload with an already hashed password       | user-service     |
// | UserChanges     | Partial update                                       | user-service     |
// | Credentials     | Hash lookup result used by login                     | user-service     |
// | Vehicle         | Vehicle row, `user_id` is a soft reference            | vehicle-service  |
// | NewVehicle      | Insert payload                                       | vehicle-service  |
// | VehicleChanges  | Partial update                                       | vehicle-service  |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type UserId = i32;
pub type VehicleId = i32;

/// Sentinel make/model of the vehicle created for every new user
pub const PLACEHOLDER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credentials {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Credentials {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: VehicleId,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub user_id: UserId,
}

impl NewVehicle {
    /// The row created when a `USER_CREATED` event arrives
    pub fn placeholder(user_id: UserId) -> Self {
        Self {
            make: PLACEHOLDER.to_owned(),
            model: PLACEHOLDER.to_owned(),
            year: None,
            user_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VehicleChanges {
    pub make: Option<String>,
    pub model: Option<String>,
    /// `None` leaves the year alone, `Some(None)` (JSON `null`) clears it
    #[serde(default, deserialize_with = "present_field")]
    pub year: Option<Option<i32>>,
    pub user_id: Option<UserId>,
}

/// Maps a field that is present in the body to `Some`, even when it is `null`
fn present_field<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_vehicle_has_sentinel_values() {
        let vehicle = NewVehicle::placeholder(7);
        assert_eq!(vehicle.make, "Unknown");
        assert_eq!(vehicle.model, "Unknown");
        assert_eq!(vehicle.year, None);
        assert_eq!(vehicle.user_id, 7);
    }

    #[test]
    fn vehicle_changes_tell_null_year_from_missing_year() {
        let missing: VehicleChanges = serde_json::from_str(r#"{"make":"Saab"}"#).unwrap();
        assert_eq!(missing.year, None);

        let cleared: VehicleChanges = serde_json::from_str(r#"{"year":null}"#).unwrap();
        assert_eq!(cleared.year, Some(None));

        let set: VehicleChanges = serde_json::from_str(r#"{"year":1999}"#).unwrap();
        assert_eq!(set.year, Some(Some(1999)));
    }

    #[test]
    fn user_json_has_no_password() {
        let user = User {
            id: 1,
            email: "a@x.com".to_owned(),
            name: "A".to_owned(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "a@x.com");
    }
}

//--------------------------------------------------------------------------------------------------
// STRUCTS & ENUMS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                       | Key Methods          |
// |-----------------|---------------------------------------------------|----------------------|
// | EventType       | Closed set of event tags understood by consumers  | as_str, parse        |
// | DomainEvent     | Wire envelope `{ "type", "data" }`                | user_created, kind   |
// | UserCreated     | Typed payload of USER_CREATED                     |                      |
// | VehicleCreated  | Typed payload of VEHICLE_CREATED                  |                      |
// | EventError      | Error types for event processing                  |                      |
//--------------------------------------------------------------------------------------------------

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::models::{User, UserId, Vehicle, VehicleId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Bytes that are not a JSON event envelope
    #[error("failed to decode event: {0}")]
    Decode(String),

    #[error("failed to encode event: {0}")]
    Encode(String),

    /// Envelope is fine but `data` does not match the event type
    #[error("invalid {event_type} payload: {reason}")]
    Payload { event_type: String, reason: String },

    /// Handler failed while applying the event
    #[error("handler failed: {0}")]
    Handler(String),
}

pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    UserCreated,
    VehicleCreated,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserCreated => "USER_CREATED",
            Self::VehicleCreated => "VEHICLE_CREATED",
        }
    }

    /// `None` for tags outside the known set
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "USER_CREATED" => Some(Self::UserCreated),
            "VEHICLE_CREATED" => Some(Self::VehicleCreated),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event envelope as it travels over the exchange
///
/// The tag is kept as a plain string so that envelopes with tags this build
/// does not know still decode and can be skipped by the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl DomainEvent {
    pub fn new(event_type: EventType, data: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.as_str().to_owned(),
            data,
        }
    }

    /// `{ "type": "USER_CREATED", "data": { "id", "email" } }`
    pub fn user_created(user: &User) -> Self {
        Self::new(EventType::UserCreated, object(json!({
            "id": user.id,
            "email": user.email,
        })))
    }

    pub fn vehicle_created(vehicle: &Vehicle) -> Self {
        Self::new(EventType::VehicleCreated, object(json!({
            "id": vehicle.id,
            "make": vehicle.make,
            "model": vehicle.model,
            "year": vehicle.year,
            "user_id": vehicle.user_id,
        })))
    }

    pub fn kind(&self) -> Option<EventType> {
        EventType::parse(&self.event_type)
    }

    /// Deserializes `data` into the payload type of this event
    pub fn payload<T: DeserializeOwned>(&self) -> EventResult<T> {
        serde_json::from_value(Value::Object(self.data.clone())).map_err(|err| {
            EventError::Payload {
                event_type: self.event_type.clone(),
                reason: err.to_string(),
            }
        })
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleCreated {
    pub id: VehicleId,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub user_id: UserId,
}

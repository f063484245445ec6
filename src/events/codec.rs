//! JSON wire codec for [`DomainEvent`] envelopes.

use super::types::{DomainEvent, EventError, EventResult};

pub const CONTENT_TYPE: &str = "application/json";

pub fn encode(event: &DomainEvent) -> EventResult<Vec<u8>> {
    serde_json::to_vec(event).map_err(|err| EventError::Encode(err.to_string()))
}

/// Any bytes that are not a JSON object with a string `type` fail here
pub fn decode(bytes: &[u8]) -> EventResult<DomainEvent> {
    serde_json::from_slice(bytes).map_err(|err| EventError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventType;
    use serde_json::{Map, json};

    #[test]
    fn decode_inverts_encode() {
        let mut data = Map::new();
        data.insert("id".to_owned(), json!(7));
        data.insert("email".to_owned(), json!("b@x.com"));
        data.insert("nested".to_owned(), json!({ "list": [1, 2, null], "flag": true }));
        let event = DomainEvent::new(EventType::UserCreated, data);

        assert_eq!(decode(&encode(&event).unwrap()).unwrap(), event);
    }

    #[test]
    fn wire_shape_matches_envelope() {
        let bytes = br#"{"type":"USER_CREATED","data":{"id":1,"email":"a@x.com"}}"#;
        let event = decode(bytes).unwrap();
        assert_eq!(event.kind(), Some(EventType::UserCreated));
        assert_eq!(event.data["email"], "a@x.com");
    }

    #[test]
    fn malformed_bytes_are_decode_errors() {
        for bytes in [&b"not json"[..], b"[1,2]", b"{\"data\":{}}", b"\xff\xfe"] {
            assert!(matches!(decode(bytes), Err(EventError::Decode(_))));
        }
    }

    #[test]
    fn missing_data_decodes_as_empty() {
        let event = decode(br#"{"type":"SOMETHING_ELSE"}"#).unwrap();
        assert!(event.data.is_empty());
        assert_eq!(event.kind(), None);
    }
}

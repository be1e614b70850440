//! Real-time notification protocol.
//!
//! Inbound frames are `{"type": "<event>", "data": {...}}`; the only
//! outbound frame the client needs is the authenticate message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encoded::value_to_text;

/// Server-pushed event types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CommissionCreated,
    CommissionUpdated,
    PaymentCreated,
    PaymentStatusChanged,
    SaleCreated,
    DashboardUpdate,
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::CommissionCreated,
        EventType::CommissionUpdated,
        EventType::PaymentCreated,
        EventType::PaymentStatusChanged,
        EventType::SaleCreated,
        EventType::DashboardUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CommissionCreated => "commission_created",
            EventType::CommissionUpdated => "commission_updated",
            EventType::PaymentCreated => "payment_created",
            EventType::PaymentStatusChanged => "payment_status_changed",
            EventType::SaleCreated => "sale_created",
            EventType::DashboardUpdate => "dashboard_update",
            EventType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound event frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default)]
    pub data: Value,
}

impl ServerEvent {
    pub fn new(kind: EventType, data: Value) -> Self {
        Self { kind, data }
    }
}

/// Read `field` from an event payload as display text.
pub fn payload_text(data: &Value, field: &str) -> Option<String> {
    data.get(field).and_then(value_to_text)
}

/// Outbound frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind the socket to an identity; sent once per connection.
    #[serde(rename = "auth")]
    Authenticate { user_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_event() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type": "commission_created", "data": {"amount": 50}}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventType::CommissionCreated);
        assert_eq!(payload_text(&event.data, "amount").as_deref(), Some("50"));
    }

    #[test]
    fn test_unknown_event_type_and_missing_data() {
        let event: ServerEvent = serde_json::from_str(r#"{"type": "weather"}"#).unwrap();
        assert_eq!(event.kind, EventType::Unknown);
        assert_eq!(event.data, Value::Null);
    }

    #[test]
    fn test_authenticate_wire_shape() {
        let msg = ClientMessage::Authenticate {
            user_id: "u-1".into(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "auth", "user_id": "u-1"})
        );
    }

    #[test]
    fn test_event_type_names_round_trip_with_as_str() {
        for kind in EventType::ALL {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.as_str()));
        }
    }
}

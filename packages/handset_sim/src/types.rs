use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical phone-number string identifying a simulated handset.
///
/// Two raw inputs that denote the same device normalize to an identical key
/// (see [`crate::phone::normalize`]). The registry, the per-device
/// conversation, and the outbox all identify devices by this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DeviceKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message direction relative to the gateway service.
///
/// `Inbound` = simulated device to service, `Outbound` = service to device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub direction: Direction,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// A known handset as reported by the device registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub phone_number: DeviceKey,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub message_count: u64,
}

impl Device {
    /// A client-side placeholder for a device the registry has not confirmed
    /// yet. Replaced wholesale by the next successful registry fetch.
    pub fn provisional(phone_number: DeviceKey) -> Self {
        Self {
            phone_number,
            label: String::new(),
            message_count: 0,
        }
    }
}

/// The message history between one device and the service, chronological.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub phone_number: DeviceKey,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// One service-to-device message from the global outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub phone_number: DeviceKey,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// The two messages returned by a successful send: the inbound echo of the
/// user's message followed by the service's outbound reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub user_message: Message,
    pub system_response: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReceipt {
    pub status: String,
    pub message: String,
}

/// Re-sorts an outbox snapshot newest-first for display. The server returns
/// entries unordered.
pub fn sorted_newest_first(mut entries: Vec<OutboxEntry>) -> Vec<OutboxEntry> {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(phone: &str, body: &str, secs: i64) -> OutboxEntry {
        OutboxEntry {
            phone_number: DeviceKey::from(phone),
            body: body.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_sorted_newest_first() {
        let entries = vec![
            entry("+249911111111", "first", 100),
            entry("+249922222222", "third", 300),
            entry("+249933333333", "second", 200),
        ];

        let sorted = sorted_newest_first(entries);

        assert_eq!(sorted[0].body, "third");
        assert_eq!(sorted[1].body, "second");
        assert_eq!(sorted[2].body, "first");
    }

    #[test]
    fn test_message_wire_shape() {
        let json = r#"{"direction":"INBOUND","body":"HELP","timestamp":"2024-01-01T00:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.direction, Direction::Inbound);
        assert_eq!(msg.body, "HELP");
    }

    #[test]
    fn test_device_wire_shape() {
        let json = r#"{"phoneNumber":"+249912345678","label":"Test","messageCount":4}"#;
        let device: Device = serde_json::from_str(json).unwrap();

        assert_eq!(device.phone_number.as_str(), "+249912345678");
        assert_eq!(device.message_count, 4);
    }

    #[test]
    fn test_device_defaults() {
        // The registry may omit label/messageCount for fresh devices
        let json = r#"{"phoneNumber":"+249912345678"}"#;
        let device: Device = serde_json::from_str(json).unwrap();

        assert_eq!(device.label, "");
        assert_eq!(device.message_count, 0);
    }

    #[test]
    fn test_send_receipt_wire_shape() {
        let json = r#"{
            "userMessage":{"direction":"INBOUND","body":"HELP","timestamp":"2024-01-01T00:00:00Z"},
            "systemResponse":{"direction":"OUTBOUND","body":"Commands: ...","timestamp":"2024-01-01T00:00:01Z"}
        }"#;
        let receipt: SendReceipt = serde_json::from_str(json).unwrap();

        assert_eq!(receipt.user_message.direction, Direction::Inbound);
        assert_eq!(receipt.system_response.direction, Direction::Outbound);
    }
}

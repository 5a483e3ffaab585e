use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One protocol event as delivered inside a sync response.
///
/// Created once by deserialization and shared read-only afterwards. Two
/// events are the same logical event iff their `event_id` matches. Stripped
/// invite-state events may arrive without an id or timestamp; both default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Event {
    /// Unique event identifier
    #[serde(default)]
    pub event_id: String,

    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event sender user ID
    #[serde(default)]
    pub sender: String,

    /// Room this event belongs to, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,

    /// State key for state events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    /// Opaque event content
    #[serde(default)]
    pub content: Value,

    /// Server timestamp when the event was created, in milliseconds
    #[serde(default)]
    pub origin_server_ts: i64,
}

impl Event {
    pub fn new(
        event_id: String,
        event_type: String,
        sender: String,
        content: Value,
        origin_server_ts: i64,
    ) -> Self {
        Self {
            event_id,
            event_type,
            sender,
            room_id: None,
            state_key: None,
            content,
            origin_server_ts,
        }
    }

    /// Whether this event carries a state key and therefore folds into the
    /// room state table.
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }
}

use serde::{Deserialize, Serialize};

/// `m.room.topic` event content
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoomTopicEventContent {
    /// Human-readable room topic
    #[serde(default)]
    pub topic: String,
}

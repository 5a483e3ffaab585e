use serde::{Deserialize, Serialize};

/// `m.room.name` event content
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoomNameEventContent {
    /// Human-readable room name; an empty string clears the name
    #[serde(default)]
    pub name: String,
}

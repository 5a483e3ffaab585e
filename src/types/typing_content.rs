use serde::{Deserialize, Serialize};

/// `m.typing` event content
///
/// A full snapshot of who is typing in the room, never an increment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypingEventContent {
    /// User IDs currently typing in the room
    #[serde(default)]
    pub user_ids: Vec<String>,
}

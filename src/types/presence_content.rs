use serde::{Deserialize, Serialize};

use crate::types::PresenceState;

/// `m.presence` event content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEventContent {
    /// The presence state for the sending user
    pub presence: PresenceState,

    /// Current display name, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,

    /// Current avatar URL, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Milliseconds since the user last performed an action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_ago: Option<i64>,

    /// Whether the user is currently active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currently_active: Option<bool>,
}

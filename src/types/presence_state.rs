use serde::{Deserialize, Serialize};

/// Presence states a user can be in, as reported by `m.presence` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    /// User is connected and active
    Online,
    /// User is not connected
    Offline,
    /// User is connected but idle
    Unavailable,
    /// No presence information has been seen for this user
    #[default]
    #[serde(other)]
    Unknown,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Online => "online",
            PresenceState::Offline => "offline",
            PresenceState::Unavailable => "unavailable",
            PresenceState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

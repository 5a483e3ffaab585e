use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `m.room.power_levels` event content, reduced to the member levels this
/// core tracks
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PowerLevelsEventContent {
    /// Explicit power levels per user id
    #[serde(default)]
    pub users: BTreeMap<String, i64>,

    /// Level for users absent from the `users` map
    #[serde(default)]
    pub users_default: i64,
}

impl PowerLevelsEventContent {
    /// The effective level for `user_id`.
    pub fn level_for(&self, user_id: &str) -> i64 {
        self.users.get(user_id).copied().unwrap_or(self.users_default)
    }
}

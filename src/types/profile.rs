use serde::{Deserialize, Serialize};

/// Result of a profile lookup for a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfileInfo {
    /// Globally displayed name, when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,

    /// Globally displayed avatar URL, when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

use serde::{Deserialize, Serialize};

use crate::types::MembershipState;

/// `m.room.member` event content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberEventContent {
    /// Membership state this event sets for the target user
    pub membership: MembershipState,

    /// Display name the member chose for this room
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,

    /// Avatar URL the member chose for this room
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl MemberEventContent {
    pub fn new(membership: MembershipState) -> Self {
        Self { membership, displayname: None, avatar_url: None }
    }
}

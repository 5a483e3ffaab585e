use serde::{Deserialize, Serialize};

/// Room membership states as defined by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    /// User has been invited to the room
    Invite,
    /// User has joined the room
    Join,
    /// User has left the room
    Leave,
    /// User has been banned from the room
    Ban,
    /// User has knocked on the room (requesting to join)
    Knock,
}

impl MembershipState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipState::Invite => "invite",
            MembershipState::Join => "join",
            MembershipState::Leave => "leave",
            MembershipState::Ban => "ban",
            MembershipState::Knock => "knock",
        }
    }

    /// Whether this membership counts toward the room's visible member list.
    pub fn is_active(&self) -> bool {
        matches!(self, MembershipState::Invite | MembershipState::Join)
    }
}

impl std::fmt::Display for MembershipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

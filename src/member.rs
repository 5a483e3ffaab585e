//! Derived room member records.

use serde::{Deserialize, Serialize};

use crate::directory::UserDirectory;
use crate::types::{MemberEventContent, MembershipState};

/// One member of one room.
///
/// Always derivable from the room's membership state entry plus overlays
/// from the user directory and the room's typing snapshot. Exactly one
/// record exists per user id ever seen in the room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    /// User identifier
    pub user_id: String,

    /// Room this record belongs to
    pub room_id: String,

    /// Current membership, mirroring the room state entry
    pub membership: MembershipState,

    /// Resolved display name; the raw user id when nothing better is known
    pub display_name: String,

    /// Resolved avatar URL
    pub avatar_url: Option<String>,

    /// Whether the member appeared in the latest typing snapshot
    pub typing: bool,

    /// Power level from the room's power-levels state
    pub power_level: i64,
}

impl RoomMember {
    pub(crate) fn new(room_id: &str, user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            room_id: room_id.to_owned(),
            membership: MembershipState::Leave,
            display_name: user_id.to_owned(),
            avatar_url: None,
            typing: false,
            power_level: 0,
        }
    }

    /// Whether the display name is still the raw user id with no avatar,
    /// i.e. no profile source has supplied anything yet.
    pub fn is_unresolved(&self) -> bool {
        self.display_name == self.user_id && self.avatar_url.is_none()
    }

    /// Re-derives membership, display name and avatar from the member event
    /// content plus the directory overlay.
    ///
    /// Precedence per field: event-supplied value, then the directory cache
    /// (invited members only), then the raw user id / no avatar.
    pub(crate) fn apply_content(
        &mut self,
        content: &MemberEventContent,
        directory: &UserDirectory,
    ) {
        self.membership = content.membership;

        let cached = match content.membership {
            MembershipState::Invite => directory.get(&self.user_id),
            _ => None,
        };

        self.display_name = content
            .displayname
            .clone()
            .or_else(|| cached.and_then(|user| user.display_name.clone()))
            .unwrap_or_else(|| self.user_id.clone());
        self.avatar_url = content
            .avatar_url
            .clone()
            .or_else(|| cached.and_then(|user| user.avatar_url.clone()));
    }
}

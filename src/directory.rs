//! Global user directory: the presence and profile cache every room's
//! member overlay consults.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Event, PresenceEventContent, PresenceState, ProfileInfo};

/// A user known to the client, as seen through presence events and profile
/// lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub user_id: String,

    /// Last reported presence state
    pub presence: PresenceState,

    /// Cached display name, when any source has supplied one
    pub display_name: Option<String>,

    /// Cached avatar URL, when any source has supplied one
    pub avatar_url: Option<String>,

    /// Server timestamp of the user's last activity, in milliseconds
    pub last_active_ts: Option<i64>,

    /// Directory write sequence of the last mutation to this record
    #[serde(skip)]
    pub(crate) last_write: u64,
}

impl User {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            presence: PresenceState::Unknown,
            display_name: None,
            avatar_url: None,
            last_active_ts: None,
            last_write: 0,
        }
    }
}

/// What a presence application changed, for notification diffing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PresenceApplied {
    pub old: PresenceState,
    pub new: PresenceState,
    /// Whether the display name or avatar changed
    pub profile_changed: bool,
}

/// Global presence/profile cache keyed by user id.
///
/// Mutated only by the reconciliation pass and by the resolver completion
/// path; every write bumps a monotonic sequence and stamps the record, which
/// is how races between presence and completed lookups are arbitrated.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, User>,
    seq: u64,
}

impl UserDirectory {
    pub fn get(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The current write sequence. A resolver request snapshots this at
    /// issue time; its result only applies if the record is not stamped
    /// later.
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Upserts the sender's record from a presence event.
    pub(crate) fn apply_presence(
        &mut self,
        event: &Event,
        content: &PresenceEventContent,
    ) -> PresenceApplied {
        let seq = self.next_seq();
        let user = self
            .users
            .entry(event.sender.clone())
            .or_insert_with(|| User::new(&event.sender));

        let old = user.presence;
        user.presence = content.presence;

        let mut profile_changed = false;
        if let Some(name) = &content.displayname {
            if user.display_name.as_deref() != Some(name) {
                user.display_name = Some(name.clone());
                profile_changed = true;
            }
        }
        if let Some(avatar) = &content.avatar_url {
            if user.avatar_url.as_deref() != Some(avatar) {
                user.avatar_url = Some(avatar.clone());
                profile_changed = true;
            }
        }
        if let Some(ago) = content.last_active_ago {
            user.last_active_ts = Some(event.origin_server_ts.saturating_sub(ago));
        }
        user.last_write = seq;

        PresenceApplied { old, new: user.presence, profile_changed }
    }

    /// Applies a completed profile lookup, unless the record has seen a
    /// fresher write since the lookup was issued.
    ///
    /// Returns whether the directory changed.
    pub(crate) fn apply_profile(
        &mut self,
        user_id: &str,
        profile: &ProfileInfo,
        issued_seq: u64,
    ) -> bool {
        if let Some(user) = self.users.get(user_id) {
            if user.last_write > issued_seq {
                debug!(user_id, "discarding stale profile lookup result");
                return false;
            }
        }

        let seq = self.next_seq();
        let user = self.users.entry(user_id.to_owned()).or_insert_with(|| User::new(user_id));

        let mut changed = false;
        if profile.displayname.is_some() && user.display_name != profile.displayname {
            user.display_name = profile.displayname.clone();
            changed = true;
        }
        if profile.avatar_url.is_some() && user.avatar_url != profile.avatar_url {
            user.avatar_url = profile.avatar_url.clone();
            changed = true;
        }
        user.last_write = seq;
        changed
    }
}

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// One incremental sync batch as decoded from the transport.
///
/// Only the skeleton is typed. Section bodies stay opaque `Value`s and are
/// unpacked leniently by the engine, so one malformed section never poisons
/// the rest of the response. Unknown fields (account data, device lists,
/// to-device) are ignored.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncResponse {
    /// Continuation token to supply as `since` on the next poll
    #[serde(default)]
    pub next_batch: String,

    /// Global presence section
    #[serde(default)]
    pub presence: Option<Value>,

    /// Per-room sections
    #[serde(default)]
    pub rooms: Option<RoomsUpdate>,
}

/// Room deltas grouped by the user's membership category
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoomsUpdate {
    /// Rooms the user has joined
    #[serde(default)]
    pub join: BTreeMap<String, JoinedRoomUpdate>,

    /// Rooms the user has been invited to
    #[serde(default)]
    pub invite: BTreeMap<String, InvitedRoomUpdate>,

    /// Rooms the user has left
    #[serde(default)]
    pub leave: BTreeMap<String, LeftRoomUpdate>,
}

/// Delta for a joined room
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JoinedRoomUpdate {
    /// State events known before the timeline slice
    #[serde(default)]
    pub state: Option<Value>,

    /// Timeline events, oldest first
    #[serde(default)]
    pub timeline: Option<Value>,

    /// Ephemeral events (typing, receipts)
    #[serde(default)]
    pub ephemeral: Option<Value>,
}

/// Delta for an invited room; carries stripped state only
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InvitedRoomUpdate {
    #[serde(default)]
    pub invite_state: Option<Value>,
}

/// Delta for a left room
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LeftRoomUpdate {
    /// Room state up to the point of leaving
    #[serde(default)]
    pub state: Option<Value>,

    /// Final timeline slice
    #[serde(default)]
    pub timeline: Option<Value>,
}

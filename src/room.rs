//! Room aggregate: current state, members, timeline, receipts and the
//! derived display name.

use std::collections::{HashMap, HashSet};

use crate::member::RoomMember;
use crate::receipts::ReceiptStore;
use crate::timeline::Timeline;
use crate::types::{Event, RoomNameEventContent, RoomTopicEventContent};

/// Fallback display name for a room with no name state and no other
/// members.
pub const EMPTY_ROOM_NAME: &str = "Empty room";

/// Current-state table for one room, keyed by `(event type, state key)`.
///
/// The stored event for a key is the most recently *applied* one; apply
/// order is authoritative, timestamps are not consulted.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    entries: HashMap<(String, String), Event>,
}

impl RoomState {
    /// Key-overwrite fold. Returns the event the key previously held.
    pub(crate) fn apply(&mut self, event: Event) -> Option<Event> {
        let state_key = event.state_key.clone().unwrap_or_default();
        self.entries.insert((event.event_type.clone(), state_key), event)
    }

    pub fn get(&self, event_type: &str, state_key: &str) -> Option<&Event> {
        self.entries.get(&(event_type.to_owned(), state_key.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One conversation and everything the client derives for it.
///
/// Created on first reference in any sync section and kept for the life of
/// the client session; leaving a room changes membership, it does not
/// remove the room.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room identifier
    pub room_id: String,

    pub(crate) state: RoomState,
    pub(crate) members: HashMap<String, RoomMember>,
    pub(crate) timeline: Timeline,
    pub(crate) receipts: ReceiptStore,
    pub(crate) typing_user_ids: HashSet<String>,

    /// Pagination anchor from the most recent timeline section, for an
    /// external backfill collaborator
    pub(crate) prev_batch: Option<String>,

    computed_name: String,
}

impl Room {
    pub(crate) fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_owned(),
            state: RoomState::default(),
            members: HashMap::new(),
            timeline: Timeline::default(),
            receipts: ReceiptStore::default(),
            typing_user_ids: HashSet::new(),
            prev_batch: None,
            computed_name: EMPTY_ROOM_NAME.to_owned(),
        }
    }

    /// The display name computed at the end of the last reconciliation
    /// pass that touched this room.
    pub fn name(&self) -> &str {
        &self.computed_name
    }

    /// The room topic, straight from the state table.
    pub fn topic(&self) -> Option<String> {
        let event = self.state.get("m.room.topic", "")?;
        let content: RoomTopicEventContent =
            serde_json::from_value(event.content.clone()).ok()?;
        (!content.topic.is_empty()).then_some(content.topic)
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn member(&self, user_id: &str) -> Option<&RoomMember> {
        self.members.get(user_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &RoomMember> {
        self.members.values()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn receipts(&self) -> &ReceiptStore {
        &self.receipts
    }

    pub fn typing_user_ids(&self) -> &HashSet<String> {
        &self.typing_user_ids
    }

    pub fn prev_batch(&self) -> Option<&str> {
        self.prev_batch.as_deref()
    }

    /// Derives the room's display name.
    ///
    /// A non-empty `m.room.name` entry wins. Otherwise the name is built
    /// from the other invited/joined members, ordered by user id for
    /// determinism: none → a fixed placeholder, one → their display name,
    /// more → the first two names plus a count of the rest.
    pub(crate) fn derive_name(&self, own_user_id: &str) -> String {
        if let Some(event) = self.state.get("m.room.name", "") {
            if let Ok(content) =
                serde_json::from_value::<RoomNameEventContent>(event.content.clone())
            {
                if !content.name.is_empty() {
                    return content.name;
                }
            }
        }

        let mut others: Vec<&RoomMember> = self
            .members
            .values()
            .filter(|member| member.user_id != own_user_id && member.membership.is_active())
            .collect();
        others.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        match others.as_slice() {
            [] => EMPTY_ROOM_NAME.to_owned(),
            [only] => only.display_name.clone(),
            [first, second] => format!("{} and {}", first.display_name, second.display_name),
            [first, second, rest @ ..] => format!(
                "{}, {} and {} other{}",
                first.display_name,
                second.display_name,
                rest.len(),
                if rest.len() == 1 { "" } else { "s" }
            ),
        }
    }

    pub(crate) fn set_computed_name(&mut self, name: String) {
        self.computed_name = name;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::directory::UserDirectory;
    use crate::types::{MemberEventContent, MembershipState};

    const SELF: &str = "@alice:localhost";

    fn room_with_members(members: &[(&str, &str, MembershipState)]) -> Room {
        let mut room = Room::new("!foo:localhost");
        let directory = UserDirectory::default();
        for (user_id, name, membership) in members {
            let mut member = RoomMember::new(&room.room_id, user_id);
            let mut content = MemberEventContent::new(*membership);
            content.displayname = (!name.is_empty()).then(|| (*name).to_owned());
            member.apply_content(&content, &directory);
            room.members.insert((*user_id).to_owned(), member);
        }
        room
    }

    #[test]
    fn name_state_wins() {
        let mut room = room_with_members(&[("@bob:bar", "Bob Smith", MembershipState::Join)]);
        let mut event = Event::new(
            "$name".to_owned(),
            "m.room.name".to_owned(),
            SELF.to_owned(),
            json!({"name": "A new room name"}),
            1,
        );
        event.state_key = Some(String::new());
        room.state.apply(event);
        assert_eq!(room.derive_name(SELF), "A new room name");
    }

    #[test]
    fn one_other_member_names_the_room() {
        let room = room_with_members(&[
            (SELF, "", MembershipState::Join),
            ("@bob:bar", "Bob Smith", MembershipState::Join),
        ]);
        assert_eq!(room.derive_name(SELF), "Bob Smith");
    }

    #[test]
    fn two_others_are_joined() {
        let room = room_with_members(&[
            (SELF, "", MembershipState::Join),
            ("@bob:bar", "Bob", MembershipState::Join),
            ("@claire:bar", "Claire", MembershipState::Invite),
        ]);
        assert_eq!(room.derive_name(SELF), "Bob and Claire");
    }

    #[test]
    fn a_crowd_gets_a_count_suffix() {
        let room = room_with_members(&[
            (SELF, "", MembershipState::Join),
            ("@a:bar", "Ann", MembershipState::Join),
            ("@b:bar", "Ben", MembershipState::Join),
            ("@c:bar", "Cam", MembershipState::Join),
            ("@d:bar", "Dee", MembershipState::Join),
        ]);
        assert_eq!(room.derive_name(SELF), "Ann, Ben and 2 others");
    }

    #[test]
    fn left_and_banned_members_do_not_count() {
        let room = room_with_members(&[
            (SELF, "", MembershipState::Join),
            ("@bob:bar", "Bob", MembershipState::Leave),
            ("@mallory:bar", "Mallory", MembershipState::Ban),
        ]);
        assert_eq!(room.derive_name(SELF), EMPTY_ROOM_NAME);
    }

    #[test]
    fn topic_reads_from_state() {
        let mut room = Room::new("!foo:localhost");
        assert_eq!(room.topic(), None);
        let mut event = Event::new(
            "$topic".to_owned(),
            "m.room.topic".to_owned(),
            SELF.to_owned(),
            json!({"topic": "All things sync"}),
            1,
        );
        event.state_key = Some(String::new());
        room.state.apply(event);
        assert_eq!(room.topic().as_deref(), Some("All things sync"));
    }
}

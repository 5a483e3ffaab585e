//! The reconciliation engine: folds sync responses into room and user
//! state and produces change notifications.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, warn};

use crate::directory::{User, UserDirectory};
use crate::error::SyncError;
use crate::member::RoomMember;
use crate::receipts::ReceiptEntry;
use crate::room::Room;
use crate::types::{
    Event,
    EventKind,
    MemberEventContent,
    MembershipState,
    PowerLevelsEventContent,
    PresenceState,
    ProfileInfo,
    ReceiptEventContent,
    SyncResponse,
    TypingEventContent,
};

/// Configuration for the sync engine and client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The user this client is logged in as; excluded from room name
    /// derivation.
    pub user_id: String,

    /// Resolve invited members' profiles over the network when neither the
    /// member event nor a presence event has supplied them.
    pub resolve_invites_to_profiles: bool,
}

impl SyncConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), resolve_invites_to_profiles: false }
    }
}

/// Lifecycle states of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not running; the only terminal state
    Stopped,
    /// First response fully reconciled, client state is usable
    Prepared,
    /// Continuously polling
    Syncing,
    /// Transport failed, retrying with the same cursor after backoff
    Reconnecting,
    /// A reconnect attempt failed too
    Error,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncState::Stopped => "stopped",
            SyncState::Prepared => "prepared",
            SyncState::Syncing => "syncing",
            SyncState::Reconnecting => "reconnecting",
            SyncState::Error => "error",
        };
        f.write_str(label)
    }
}

/// One changed field of a room member.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberChange {
    Membership {
        /// `None` when the member was first seen this pass
        old: Option<MembershipState>,
        new: MembershipState,
    },
    DisplayName {
        old: String,
        new: String,
    },
    AvatarUrl {
        old: Option<String>,
        new: Option<String>,
    },
    Typing {
        typing: bool,
    },
    PowerLevel {
        old: i64,
        new: i64,
    },
}

/// Change notification emitted after a reconciliation pass.
///
/// Updates for a pass are emitted only once the pass's state mutation is
/// complete, in dependency order: presence before member overlays, state
/// before derived names.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    RoomNameChanged {
        room_id: String,
        old: String,
        new: String,
    },
    MemberChanged {
        room_id: String,
        user_id: String,
        change: MemberChange,
    },
    TimelineAppended {
        room_id: String,
        event: Event,
    },
    ReceiptUpdated {
        room_id: String,
        event_id: String,
        receipt_type: String,
        user_id: String,
    },
    PresenceChanged {
        user_id: String,
        old: PresenceState,
        new: PresenceState,
    },
    SyncLifecycle {
        state: SyncState,
    },
    /// A response section was present but not of the expected shape and was
    /// skipped; the rest of the response still applied
    MalformedSection {
        room_id: Option<String>,
        context: String,
    },
    /// A profile lookup failed; the member stays unresolved
    ProfileLookupFailed {
        user_id: String,
    },
}

/// Outcome of folding one sync response.
#[derive(Debug, Default)]
pub struct AppliedSync {
    /// Notifications for the pass, in emission order
    pub updates: Vec<SyncUpdate>,

    /// Users whose membership just became `invite` and whose profile is
    /// still unresolved; empty unless profile resolution is enabled
    pub resolve_requests: Vec<String>,
}

/// Bookkeeping for one reconciliation pass.
#[derive(Default)]
struct Pass {
    updates: Vec<SyncUpdate>,
    /// Rooms whose derived name must be recomputed
    touched_rooms: BTreeSet<String>,
    /// Users whose directory profile changed this pass
    profile_touched: BTreeSet<String>,
    /// Users whose membership became `invite` this pass, in first-seen order
    invite_candidates: Vec<String>,
}

impl Pass {
    fn malformed(&mut self, room_id: Option<&str>, context: impl Into<String>) {
        let context = context.into();
        let error = SyncError::MalformedSection { context: context.clone() };
        warn!(room_id = room_id.unwrap_or("-"), %error, "skipping malformed sync data");
        self.updates.push(SyncUpdate::MalformedSection {
            room_id: room_id.map(str::to_owned),
            context,
        });
    }

    fn note_invite(&mut self, user_id: &str) {
        if !self.invite_candidates.iter().any(|candidate| candidate == user_id) {
            self.invite_candidates.push(user_id.to_owned());
        }
    }
}

/// The single-writer reconciliation engine.
///
/// Owns the room registry and the user directory; exactly one response is
/// folded at a time, and resolver completions re-enter through
/// [`SyncEngine::apply_profile`] under the same writer.
#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    rooms: HashMap<String, Room>,
    directory: UserDirectory,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self { config, rooms: HashMap::new(), directory: UserDirectory::default() }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.directory.get(user_id)
    }

    pub fn room_member(&self, room_id: &str, user_id: &str) -> Option<&RoomMember> {
        self.rooms.get(room_id).and_then(|room| room.member(user_id))
    }

    pub fn receipts_for_event(&self, room_id: &str, event_id: &str) -> Vec<ReceiptEntry> {
        self.rooms
            .get(room_id)
            .map(|room| room.receipts().receipts_for_event(event_id))
            .unwrap_or_default()
    }

    /// The directory write sequence to stamp on profile lookups issued now.
    pub(crate) fn directory_seq(&self) -> u64 {
        self.directory.seq()
    }

    /// Folds one sync response into state.
    ///
    /// Apply order is protocol-mandated: global presence, then each room's
    /// state events, timeline events and ephemeral events, then derived
    /// names and member overlays. Absent sections are empty, malformed
    /// sections are skipped and reported, and the rest of the response
    /// still applies.
    pub fn apply(&mut self, response: &SyncResponse) -> AppliedSync {
        let mut pass = Pass::default();

        self.apply_presence_section(response.presence.as_ref(), &mut pass);

        if let Some(rooms) = &response.rooms {
            for (room_id, update) in &rooms.join {
                self.ensure_room(room_id, &mut pass);
                if let Some(section) = &update.state {
                    self.apply_state_section(room_id, section, "state", &mut pass);
                }
                if let Some(section) = &update.timeline {
                    self.apply_timeline_section(room_id, section, &mut pass);
                }
                if let Some(section) = &update.ephemeral {
                    self.apply_ephemeral_section(room_id, section, &mut pass);
                }
            }
            for (room_id, update) in &rooms.invite {
                self.ensure_room(room_id, &mut pass);
                if let Some(section) = &update.invite_state {
                    self.apply_state_section(room_id, section, "invite_state", &mut pass);
                }
            }
            for (room_id, update) in &rooms.leave {
                self.ensure_room(room_id, &mut pass);
                if let Some(section) = &update.state {
                    self.apply_state_section(room_id, section, "state", &mut pass);
                }
                if let Some(section) = &update.timeline {
                    self.apply_timeline_section(room_id, section, &mut pass);
                }
            }
        }

        self.recompute_overlays(&mut pass);
        self.recompute_names(&mut pass);

        let resolve_requests = self.collect_resolve_requests(&pass);
        debug!(
            updates = pass.updates.len(),
            rooms = pass.touched_rooms.len(),
            lookups = resolve_requests.len(),
            "sync response folded"
        );

        AppliedSync { updates: pass.updates, resolve_requests }
    }

    /// Applies a completed profile lookup under the single-writer
    /// discipline, unless a fresher directory write exists.
    pub fn apply_profile(
        &mut self,
        user_id: &str,
        profile: &ProfileInfo,
        issued_seq: u64,
    ) -> Vec<SyncUpdate> {
        if !self.directory.apply_profile(user_id, profile, issued_seq) {
            return Vec::new();
        }
        let mut pass = Pass::default();
        pass.profile_touched.insert(user_id.to_owned());
        self.recompute_overlays(&mut pass);
        self.recompute_names(&mut pass);
        pass.updates
    }

    fn ensure_room(&mut self, room_id: &str, pass: &mut Pass) {
        if !self.rooms.contains_key(room_id) {
            debug!(room_id, "tracking new room");
            self.rooms.insert(room_id.to_owned(), Room::new(room_id));
        }
        pass.touched_rooms.insert(room_id.to_owned());
    }

    /// Unpacks an `{events: [...]}` section, reporting anything that does
    /// not have that shape and skipping events that fail to decode.
    fn section_events(
        section: &Value,
        context: &str,
        room_id: Option<&str>,
        pass: &mut Pass,
    ) -> Vec<Event> {
        let Some(object) = section.as_object() else {
            pass.malformed(room_id, format!("{context} is not an object"));
            return Vec::new();
        };
        let Some(events) = object.get("events") else {
            return Vec::new();
        };
        let Some(items) = events.as_array() else {
            pass.malformed(room_id, format!("{context}.events is not an array"));
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value::<Event>(item.clone()) {
                Ok(event) => Some(event),
                Err(error) => {
                    pass.malformed(room_id, format!("{context}.events[{index}]: {error}"));
                    None
                },
            })
            .collect()
    }

    fn apply_presence_section(&mut self, section: Option<&Value>, pass: &mut Pass) {
        let Some(section) = section else {
            return;
        };
        for event in Self::section_events(section, "presence", None, pass) {
            match EventKind::of(&event) {
                Ok(EventKind::Presence(content)) => {
                    if event.sender.is_empty() {
                        pass.malformed(None, "presence event without sender");
                        continue;
                    }
                    let applied = self.directory.apply_presence(&event, &content);
                    if applied.old != applied.new {
                        pass.updates.push(SyncUpdate::PresenceChanged {
                            user_id: event.sender.clone(),
                            old: applied.old,
                            new: applied.new,
                        });
                    }
                    if applied.profile_changed {
                        pass.profile_touched.insert(event.sender.clone());
                    }
                },
                Ok(_) => {
                    debug!(event_type = %event.event_type, "ignoring event in presence section");
                },
                Err(error) => pass.malformed(None, format!("presence event: {error}")),
            }
        }
    }

    fn apply_state_section(
        &mut self,
        room_id: &str,
        section: &Value,
        label: &str,
        pass: &mut Pass,
    ) {
        let context = format!("rooms[{room_id}].{label}");
        for event in Self::section_events(section, &context, Some(room_id), pass) {
            self.apply_state_event(room_id, event, pass);
        }
    }

    fn apply_state_event(&mut self, room_id: &str, event: Event, pass: &mut Pass) {
        if event.state_key.is_none() {
            pass.malformed(
                Some(room_id),
                format!("state event {} without state_key", event.event_type),
            );
            return;
        }
        match EventKind::of(&event) {
            Ok(EventKind::Member(content)) => {
                self.apply_member_event(room_id, &event, &content, pass);
            },
            Ok(EventKind::PowerLevels(content)) => {
                if let Some(room) = self.rooms.get_mut(room_id) {
                    room.state.apply(event);
                }
                self.apply_power_levels(room_id, &content, pass);
            },
            Ok(_) => {
                if let Some(room) = self.rooms.get_mut(room_id) {
                    room.state.apply(event);
                }
            },
            Err(error) => {
                pass.malformed(
                    Some(room_id),
                    format!("state event {}: {error}", event.event_type),
                );
            },
        }
    }

    fn apply_member_event(
        &mut self,
        room_id: &str,
        event: &Event,
        content: &MemberEventContent,
        pass: &mut Pass,
    ) {
        let target = match event.state_key.as_deref() {
            Some(target) if !target.is_empty() => target.to_owned(),
            _ => {
                pass.malformed(Some(room_id), "member event without target user");
                return;
            },
        };
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };

        room.state.apply(event.clone());

        let existing = room.members.contains_key(&target);
        let initial_level = room
            .state
            .get("m.room.power_levels", "")
            .and_then(|levels| {
                serde_json::from_value::<PowerLevelsEventContent>(levels.content.clone()).ok()
            })
            .map(|levels| levels.level_for(&target));
        let typing_now = room.typing_user_ids.contains(&target);

        let member = room
            .members
            .entry(target.clone())
            .or_insert_with(|| RoomMember::new(room_id, &target));
        if !existing {
            if let Some(level) = initial_level {
                member.power_level = level;
            }
            member.typing = typing_now;
        }

        let old_membership = existing.then_some(member.membership);
        let old_name = member.display_name.clone();
        let old_avatar = member.avatar_url.clone();

        member.apply_content(content, &self.directory);

        if old_membership != Some(member.membership) {
            pass.updates.push(SyncUpdate::MemberChanged {
                room_id: room_id.to_owned(),
                user_id: target.clone(),
                change: MemberChange::Membership {
                    old: old_membership,
                    new: member.membership,
                },
            });
            if member.membership == MembershipState::Invite {
                pass.note_invite(&target);
            }
        }
        push_profile_diffs(pass, room_id, &target, old_name, old_avatar, member);
    }

    fn apply_power_levels(
        &mut self,
        room_id: &str,
        content: &PowerLevelsEventContent,
        pass: &mut Pass,
    ) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let mut changed: Vec<(String, i64, i64)> = Vec::new();
        for (user_id, member) in room.members.iter_mut() {
            let level = content.level_for(user_id);
            if member.power_level != level {
                changed.push((user_id.clone(), member.power_level, level));
                member.power_level = level;
            }
        }
        changed.sort();
        for (user_id, old, new) in changed {
            pass.updates.push(SyncUpdate::MemberChanged {
                room_id: room_id.to_owned(),
                user_id,
                change: MemberChange::PowerLevel { old, new },
            });
        }
    }

    fn apply_timeline_section(&mut self, room_id: &str, section: &Value, pass: &mut Pass) {
        let context = format!("rooms[{room_id}].timeline");
        if let Some(prev_batch) = section.get("prev_batch").and_then(Value::as_str) {
            if let Some(room) = self.rooms.get_mut(room_id) {
                room.prev_batch = Some(prev_batch.to_owned());
            }
        }
        for event in Self::section_events(section, &context, Some(room_id), pass) {
            // Timeline-carried state events fold into the state table too,
            // and always supersede the initial state block of the same
            // response for their key.
            if event.is_state() {
                self.apply_state_event(room_id, event.clone(), pass);
            }
            if event.event_id.is_empty() {
                pass.malformed(Some(room_id), format!("{context}: event without event_id"));
                continue;
            }
            let Some(room) = self.rooms.get_mut(room_id) else {
                return;
            };
            if room.timeline.append(event.clone()) {
                pass.updates.push(SyncUpdate::TimelineAppended {
                    room_id: room_id.to_owned(),
                    event,
                });
            }
        }
    }

    fn apply_ephemeral_section(&mut self, room_id: &str, section: &Value, pass: &mut Pass) {
        let context = format!("rooms[{room_id}].ephemeral");
        for event in Self::section_events(section, &context, Some(room_id), pass) {
            match EventKind::of(&event) {
                Ok(EventKind::Typing(content)) => self.apply_typing(room_id, content, pass),
                Ok(EventKind::Receipt(content)) => self.apply_receipts(room_id, &content, pass),
                Ok(_) => {
                    debug!(event_type = %event.event_type, "ignoring ephemeral event");
                },
                Err(error) => {
                    pass.malformed(Some(room_id), format!("{context}: {error}"));
                },
            }
        }
    }

    /// Typing is a full-replacement snapshot: the event's user list becomes
    /// the room's typing set and every member flag follows it.
    fn apply_typing(&mut self, room_id: &str, content: TypingEventContent, pass: &mut Pass) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let typing: HashSet<String> = content.user_ids.into_iter().collect();

        let mut flips: Vec<(String, bool)> = Vec::new();
        for (user_id, member) in room.members.iter_mut() {
            let now = typing.contains(user_id);
            if member.typing != now {
                member.typing = now;
                flips.push((user_id.clone(), now));
            }
        }
        flips.sort();
        for (user_id, now) in flips {
            pass.updates.push(SyncUpdate::MemberChanged {
                room_id: room_id.to_owned(),
                user_id,
                change: MemberChange::Typing { typing: now },
            });
        }
        room.typing_user_ids = typing;
    }

    fn apply_receipts(&mut self, room_id: &str, content: &ReceiptEventContent, pass: &mut Pass) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        for (event_id, by_type) in &content.0 {
            for (receipt_type, by_user) in by_type {
                for (user_id, data) in by_user {
                    if room.receipts.apply(event_id, receipt_type, user_id, *data) {
                        pass.updates.push(SyncUpdate::ReceiptUpdated {
                            room_id: room_id.to_owned(),
                            event_id: event_id.clone(),
                            receipt_type: receipt_type.clone(),
                            user_id: user_id.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Re-resolves the directory overlay of invited members whose user's
    /// profile changed this pass.
    fn recompute_overlays(&mut self, pass: &mut Pass) {
        if pass.profile_touched.is_empty() {
            return;
        }
        let touched: Vec<String> = pass.profile_touched.iter().cloned().collect();
        let mut room_ids: Vec<String> = self.rooms.keys().cloned().collect();
        room_ids.sort();

        for room_id in room_ids {
            for user_id in &touched {
                let Some(room) = self.rooms.get_mut(&room_id) else {
                    continue;
                };
                let Some(member) = room.members.get(user_id) else {
                    continue;
                };
                if member.membership != MembershipState::Invite {
                    continue;
                }
                let Some(content) = room
                    .state
                    .get("m.room.member", user_id)
                    .and_then(|event| {
                        serde_json::from_value::<MemberEventContent>(event.content.clone()).ok()
                    })
                else {
                    continue;
                };
                let Some(member) = room.members.get_mut(user_id) else {
                    continue;
                };
                let old_name = member.display_name.clone();
                let old_avatar = member.avatar_url.clone();
                member.apply_content(&content, &self.directory);
                if member.display_name != old_name || member.avatar_url != old_avatar {
                    pass.touched_rooms.insert(room_id.clone());
                }
                push_profile_diffs(pass, &room_id, user_id, old_name, old_avatar, member);
            }
        }
    }

    fn recompute_names(&mut self, pass: &mut Pass) {
        let touched: Vec<String> = pass.touched_rooms.iter().cloned().collect();
        for room_id in touched {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                continue;
            };
            let derived = room.derive_name(&self.config.user_id);
            if derived != room.name() {
                let old = room.name().to_owned();
                room.set_computed_name(derived.clone());
                pass.updates.push(SyncUpdate::RoomNameChanged {
                    room_id,
                    old,
                    new: derived,
                });
            }
        }
    }

    fn collect_resolve_requests(&self, pass: &Pass) -> Vec<String> {
        if !self.config.resolve_invites_to_profiles {
            return Vec::new();
        }
        pass.invite_candidates
            .iter()
            .filter(|user_id| {
                self.rooms.values().any(|room| {
                    room.member(user_id).is_some_and(|member| {
                        member.membership == MembershipState::Invite && member.is_unresolved()
                    })
                })
            })
            .cloned()
            .collect()
    }
}

fn push_profile_diffs(
    pass: &mut Pass,
    room_id: &str,
    user_id: &str,
    old_name: String,
    old_avatar: Option<String>,
    member: &RoomMember,
) {
    if member.display_name != old_name {
        pass.updates.push(SyncUpdate::MemberChanged {
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            change: MemberChange::DisplayName {
                old: old_name,
                new: member.display_name.clone(),
            },
        });
    }
    if member.avatar_url != old_avatar {
        pass.updates.push(SyncUpdate::MemberChanged {
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            change: MemberChange::AvatarUrl {
                old: old_avatar,
                new: member.avatar_url.clone(),
            },
        });
    }
}

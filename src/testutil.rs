//! Event and response factories shared by the crate's tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Value};

use crate::types::SyncResponse;

pub(crate) const SELF_USER: &str = "@alice:localhost";
pub(crate) const USER_B: &str = "@bob:localhost";
pub(crate) const USER_C: &str = "@claire:bar";
pub(crate) const ROOM_ONE: &str = "!foo:localhost";
pub(crate) const ROOM_TWO: &str = "!bar:localhost";

static NEXT_EVENT: AtomicU64 = AtomicU64::new(1);

fn next_event_id() -> String {
    format!("${}:localhost", NEXT_EVENT.fetch_add(1, Ordering::Relaxed))
}

fn next_ts() -> i64 {
    1_700_000_000_000 + NEXT_EVENT.load(Ordering::Relaxed) as i64
}

pub(crate) fn mk_message(room: &str, user: &str, body: &str) -> Value {
    json!({
        "event_id": next_event_id(),
        "type": "m.room.message",
        "room_id": room,
        "sender": user,
        "content": {"msgtype": "m.text", "body": body},
        "origin_server_ts": next_ts(),
    })
}

pub(crate) fn mk_membership(
    room: &str,
    user: &str,
    membership: &str,
    displayname: Option<&str>,
) -> Value {
    let mut content = json!({"membership": membership});
    if let Some(name) = displayname {
        content["displayname"] = json!(name);
    }
    json!({
        "event_id": next_event_id(),
        "type": "m.room.member",
        "room_id": room,
        "sender": user,
        "state_key": user,
        "content": content,
        "origin_server_ts": next_ts(),
    })
}

pub(crate) fn mk_state(room: &str, user: &str, event_type: &str, content: Value) -> Value {
    json!({
        "event_id": next_event_id(),
        "type": event_type,
        "room_id": room,
        "sender": user,
        "state_key": "",
        "content": content,
        "origin_server_ts": next_ts(),
    })
}

pub(crate) fn mk_presence(user: &str, presence: &str, displayname: Option<&str>) -> Value {
    let mut content = json!({"presence": presence, "last_active_ago": 100});
    if let Some(name) = displayname {
        content["displayname"] = json!(name);
    }
    json!({
        "event_id": next_event_id(),
        "type": "m.presence",
        "sender": user,
        "content": content,
        "origin_server_ts": next_ts(),
    })
}

pub(crate) fn mk_typing(room: &str, user_ids: &[&str]) -> Value {
    json!({
        "type": "m.typing",
        "room_id": room,
        "sender": "",
        "content": {"user_ids": user_ids},
    })
}

pub(crate) fn mk_receipt(
    room: &str,
    event_id: &str,
    receipt_type: &str,
    user: &str,
    ts: i64,
) -> Value {
    json!({
        "type": "m.receipt",
        "room_id": room,
        "sender": "",
        "content": {event_id: {receipt_type: {user: {"ts": ts}}}},
    })
}

/// Builds sync responses the way the original system's test harness scripts
/// its mock backend.
#[derive(Default)]
pub(crate) struct ResponseBuilder {
    next_batch: String,
    presence: Vec<Value>,
    join: BTreeMap<String, RoomSections>,
    invite: BTreeMap<String, Vec<Value>>,
    leave: BTreeMap<String, RoomSections>,
}

#[derive(Default)]
struct RoomSections {
    state: Vec<Value>,
    timeline: Vec<Value>,
    ephemeral: Vec<Value>,
}

impl ResponseBuilder {
    pub(crate) fn new(next_batch: &str) -> Self {
        Self { next_batch: next_batch.to_owned(), ..Self::default() }
    }

    pub(crate) fn presence(mut self, events: Vec<Value>) -> Self {
        self.presence.extend(events);
        self
    }

    pub(crate) fn join_state(mut self, room: &str, events: Vec<Value>) -> Self {
        self.join.entry(room.to_owned()).or_default().state.extend(events);
        self
    }

    pub(crate) fn join_timeline(mut self, room: &str, events: Vec<Value>) -> Self {
        self.join.entry(room.to_owned()).or_default().timeline.extend(events);
        self
    }

    pub(crate) fn join_ephemeral(mut self, room: &str, events: Vec<Value>) -> Self {
        self.join.entry(room.to_owned()).or_default().ephemeral.extend(events);
        self
    }

    pub(crate) fn invite_state(mut self, room: &str, events: Vec<Value>) -> Self {
        self.invite.entry(room.to_owned()).or_default().extend(events);
        self
    }

    pub(crate) fn leave_state(mut self, room: &str, events: Vec<Value>) -> Self {
        self.leave.entry(room.to_owned()).or_default().state.extend(events);
        self
    }

    pub(crate) fn build(self) -> SyncResponse {
        let mut body = json!({"next_batch": self.next_batch});
        if !self.presence.is_empty() {
            body["presence"] = json!({"events": self.presence});
        }

        let mut rooms = json!({});
        if !self.join.is_empty() {
            let mut join = json!({});
            for (room_id, sections) in &self.join {
                join[room_id] = sections.to_value();
            }
            rooms["join"] = join;
        }
        if !self.invite.is_empty() {
            let mut invite = json!({});
            for (room_id, events) in &self.invite {
                invite[room_id] = json!({"invite_state": {"events": events}});
            }
            rooms["invite"] = invite;
        }
        if !self.leave.is_empty() {
            let mut leave = json!({});
            for (room_id, sections) in &self.leave {
                leave[room_id] = sections.to_value();
            }
            rooms["leave"] = leave;
        }
        if rooms.as_object().is_some_and(|map| !map.is_empty()) {
            body["rooms"] = rooms;
        }

        serde_json::from_value(body).expect("test response must decode")
    }
}

impl RoomSections {
    fn to_value(&self) -> Value {
        let mut section = json!({});
        if !self.state.is_empty() {
            section["state"] = json!({"events": self.state});
        }
        if !self.timeline.is_empty() {
            section["timeline"] = json!({"events": self.timeline});
        }
        if !self.ephemeral.is_empty() {
            section["ephemeral"] = json!({"events": self.ephemeral});
        }
        section
    }
}

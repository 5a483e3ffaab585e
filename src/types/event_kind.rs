use crate::types::{
    Event,
    MemberEventContent,
    PowerLevelsEventContent,
    PresenceEventContent,
    ReceiptEventContent,
    RoomNameEventContent,
    TypingEventContent,
};

/// The event types this core reacts to, with their content decoded.
///
/// Everything else lands in `Other`: it still folds into the state table or
/// timeline as appropriate but triggers no specialized mutation.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// `m.room.member`
    Member(MemberEventContent),
    /// `m.room.name`
    RoomName(RoomNameEventContent),
    /// `m.room.power_levels`
    PowerLevels(PowerLevelsEventContent),
    /// `m.presence`
    Presence(PresenceEventContent),
    /// `m.typing`
    Typing(TypingEventContent),
    /// `m.receipt`
    Receipt(ReceiptEventContent),
    /// `m.room.message`
    Message,
    /// Any event type this core has no specialized handling for
    Other,
}

impl EventKind {
    /// Classifies an event by its type string, decoding the content for
    /// recognized types. A recognized type whose content does not decode is
    /// an error; the caller skips the event and reports it.
    pub fn of(event: &Event) -> Result<EventKind, serde_json::Error> {
        let content = event.content.clone();
        Ok(match event.event_type.as_str() {
            "m.room.member" => EventKind::Member(serde_json::from_value(content)?),
            "m.room.name" => EventKind::RoomName(serde_json::from_value(content)?),
            "m.room.power_levels" => EventKind::PowerLevels(serde_json::from_value(content)?),
            "m.presence" => EventKind::Presence(serde_json::from_value(content)?),
            "m.typing" => EventKind::Typing(serde_json::from_value(content)?),
            "m.receipt" => EventKind::Receipt(serde_json::from_value(content)?),
            "m.room.message" => EventKind::Message,
            _ => EventKind::Other,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::MembershipState;

    fn event(event_type: &str, content: serde_json::Value) -> Event {
        Event::new(
            "$e:example.com".to_owned(),
            event_type.to_owned(),
            "@alice:example.com".to_owned(),
            content,
            1,
        )
    }

    #[test]
    fn classifies_member_events() {
        let ev = event("m.room.member", json!({"membership": "join", "displayname": "Alice"}));
        match EventKind::of(&ev).unwrap() {
            EventKind::Member(content) => {
                assert_eq!(content.membership, MembershipState::Join);
                assert_eq!(content.displayname.as_deref(), Some("Alice"));
            },
            other => panic!("expected member event, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_types_are_other() {
        let ev = event("com.example.custom", json!({"whatever": true}));
        assert!(matches!(EventKind::of(&ev).unwrap(), EventKind::Other));
    }

    #[test]
    fn undecodable_recognized_content_is_an_error() {
        let ev = event("m.room.member", json!({"membership": 42}));
        assert!(EventKind::of(&ev).is_err());
    }
}

//! Per-room message timeline.

use std::collections::HashSet;

use tracing::debug;

use crate::types::Event;

/// Ordered, append-only event log for one room, deduplicated by event id.
///
/// Re-delivery of an already-seen event id across polls is dropped
/// silently; that is the normal consequence of overlapping sync batches,
/// not an error.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<Event>,
    seen: HashSet<String>,
}

impl Timeline {
    /// Appends the event unless its id is already present. Returns whether
    /// the event was added.
    pub(crate) fn append(&mut self, event: Event) -> bool {
        if !self.seen.insert(event.event_id.clone()) {
            debug!(event_id = %event.event_id, "dropping re-delivered timeline event");
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.seen.contains(event_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message(event_id: &str) -> Event {
        Event::new(
            event_id.to_owned(),
            "m.room.message".to_owned(),
            "@bob:hs".to_owned(),
            json!({"msgtype": "m.text", "body": "hello"}),
            1,
        )
    }

    #[test]
    fn appends_in_order() {
        let mut timeline = Timeline::default();
        assert!(timeline.append(message("$1")));
        assert!(timeline.append(message("$2")));
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.events()[0].event_id, "$1");
    }

    #[test]
    fn drops_redelivered_events() {
        let mut timeline = Timeline::default();
        assert!(timeline.append(message("$1")));
        assert!(!timeline.append(message("$1")));
        assert_eq!(timeline.len(), 1);
    }
}

//! Per-room read receipt tracking.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::ReceiptData;

/// One receipt marker as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptEntry {
    /// Receipt type, e.g. `m.read`
    pub receipt_type: String,

    /// User the marker belongs to
    pub user_id: String,

    /// Receipt payload
    pub data: ReceiptData,
}

/// Receipt table for one room.
///
/// Invariant: at most one live marker per `(user, receipt type)` across the
/// whole room. Applying a new marker removes the user's previous one from
/// whichever event held it.
#[derive(Debug, Clone, Default)]
pub struct ReceiptStore {
    /// event id → receipt type → user id → data
    by_event: HashMap<String, HashMap<String, HashMap<String, ReceiptData>>>,
    /// (user id, receipt type) → event id currently holding the marker
    latest: HashMap<(String, String), String>,
}

impl ReceiptStore {
    /// Moves the `(user, type)` marker to `event_id`. Returns whether
    /// anything changed; re-delivering an identical marker is a no-op.
    pub(crate) fn apply(
        &mut self,
        event_id: &str,
        receipt_type: &str,
        user_id: &str,
        data: ReceiptData,
    ) -> bool {
        let key = (user_id.to_owned(), receipt_type.to_owned());
        if self.latest.get(&key).map(String::as_str) == Some(event_id) {
            let unchanged = self
                .by_event
                .get(event_id)
                .and_then(|by_type| by_type.get(receipt_type))
                .and_then(|by_user| by_user.get(user_id))
                == Some(&data);
            if unchanged {
                return false;
            }
        }

        if let Some(previous) = self.latest.insert(key, event_id.to_owned()) {
            self.remove_marker(&previous, receipt_type, user_id);
        }

        self.by_event
            .entry(event_id.to_owned())
            .or_default()
            .entry(receipt_type.to_owned())
            .or_default()
            .insert(user_id.to_owned(), data);
        true
    }

    fn remove_marker(&mut self, event_id: &str, receipt_type: &str, user_id: &str) {
        let Some(by_type) = self.by_event.get_mut(event_id) else {
            return;
        };
        if let Some(by_user) = by_type.get_mut(receipt_type) {
            by_user.remove(user_id);
            if by_user.is_empty() {
                by_type.remove(receipt_type);
            }
        }
        if by_type.is_empty() {
            self.by_event.remove(event_id);
        }
    }

    /// All markers currently attached to `event_id`, ordered by receipt
    /// type then user id.
    pub fn receipts_for_event(&self, event_id: &str) -> Vec<ReceiptEntry> {
        let mut entries: Vec<ReceiptEntry> = self
            .by_event
            .get(event_id)
            .into_iter()
            .flat_map(|by_type| {
                by_type.iter().flat_map(|(receipt_type, by_user)| {
                    by_user.iter().map(|(user_id, data)| ReceiptEntry {
                        receipt_type: receipt_type.clone(),
                        user_id: user_id.clone(),
                        data: *data,
                    })
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.receipt_type, &a.user_id).cmp(&(&b.receipt_type, &b.user_id))
        });
        entries
    }

    /// The event currently holding the `(user, type)` marker, if any.
    pub fn latest_for(&self, user_id: &str, receipt_type: &str) -> Option<&str> {
        self.latest
            .get(&(user_id.to_owned(), receipt_type.to_owned()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_receipts_per_event() {
        let mut store = ReceiptStore::default();
        assert!(store.apply("$1", "m.read", "@bob:hs", ReceiptData { ts: 176592842636 }));

        let entries = store.receipts_for_event("$1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].receipt_type, "m.read");
        assert_eq!(entries[0].user_id, "@bob:hs");
        assert_eq!(entries[0].data.ts, 176592842636);
    }

    #[test]
    fn one_live_marker_per_user_and_type() {
        let mut store = ReceiptStore::default();
        store.apply("$1", "m.read", "@bob:hs", ReceiptData { ts: 1 });
        store.apply("$2", "m.read", "@bob:hs", ReceiptData { ts: 2 });

        assert!(store.receipts_for_event("$1").is_empty());
        assert_eq!(store.receipts_for_event("$2").len(), 1);
        assert_eq!(store.latest_for("@bob:hs", "m.read"), Some("$2"));
    }

    #[test]
    fn distinct_types_and_users_coexist() {
        let mut store = ReceiptStore::default();
        store.apply("$1", "m.read", "@bob:hs", ReceiptData { ts: 1 });
        store.apply("$1", "m.read", "@alice:hs", ReceiptData { ts: 2 });
        store.apply("$1", "m.read.private", "@bob:hs", ReceiptData { ts: 3 });

        assert_eq!(store.receipts_for_event("$1").len(), 3);
    }

    #[test]
    fn identical_redelivery_is_a_noop() {
        let mut store = ReceiptStore::default();
        assert!(store.apply("$1", "m.read", "@bob:hs", ReceiptData { ts: 1 }));
        assert!(!store.apply("$1", "m.read", "@bob:hs", ReceiptData { ts: 1 }));
        assert_eq!(store.receipts_for_event("$1").len(), 1);
    }
}

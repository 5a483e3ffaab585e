use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Payload attached to a single receipt marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReceiptData {
    /// Server timestamp of the receipt, in milliseconds
    #[serde(default)]
    pub ts: i64,
}

/// `m.receipt` event content: event id → receipt type → user id → data
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReceiptEventContent(
    pub BTreeMap<String, BTreeMap<String, BTreeMap<String, ReceiptData>>>,
);

use chrono::{DateTime, Utc};

use super::backend::StoredMessage;
use crate::model::Message;

/// Map stored messages to history messages, oldest first
///
/// Entries whose timestamp does not parse are never dropped. They sort with
/// the nearest preceding parseable entry, so they stay next to the neighbours
/// the backend returned them with.
pub fn order_history(stored: Vec<StoredMessage>) -> Vec<Message> {
    let mut carried: Option<DateTime<Utc>> = None;

    let mut keyed: Vec<(Option<DateTime<Utc>>, Message)> = stored
        .into_iter()
        .map(|entry| {
            let msg = Message::from_history(entry.sender, entry.sender_name, entry.message, &entry.date);
            if msg.timestamp.is_some() {
                carried = msg.timestamp;
            }
            (carried, msg)
        })
        .collect();

    // Stable: equal keys keep backend order
    keyed.sort_by_key(|(key, _)| *key);

    keyed.into_iter().map(|(_, msg)| msg).collect()
}

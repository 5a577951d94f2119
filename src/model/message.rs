use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::room::Identity;

/// Where a message entered the conversation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Loaded from the backend's stored history
    History,
    /// Relayed over the message channel after the room was bound
    Live,
}

/// A chat message in the bound room (immutable once created)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: Identity,
    pub sender_name: String,
    pub text: String,

    /// Parsed timestamp, `None` when the stored value could not be parsed
    pub timestamp: Option<DateTime<Utc>>,

    /// Time shown next to the message. Falls back to the raw stored value.
    pub display_time: String,

    pub origin: MessageOrigin,
}

impl Message {
    /// Build a history message from its stored representation
    pub fn from_history(
        sender_id: Identity,
        sender_name: String,
        text: String,
        stored_time: &str,
    ) -> Self {
        let timestamp = parse_stored_timestamp(stored_time);
        let display_time = match timestamp {
            Some(ts) => ts.format("%H:%M").to_string(),
            None => stored_time.to_string(),
        };

        Self {
            sender_id,
            sender_name,
            text,
            timestamp,
            display_time,
            origin: MessageOrigin::History,
        }
    }

    /// Build a live message relayed by the channel
    ///
    /// `time` is the server-formatted display time; the arrival instant is
    /// recorded as the timestamp.
    pub fn live(sender_id: Identity, sender_name: String, text: String, time: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            sender_id,
            sender_name,
            text,
            timestamp: Some(now),
            display_time: time.unwrap_or_else(|| now.format("%H:%M").to_string()),
            origin: MessageOrigin::Live,
        }
    }
}

/// Parse a stored timestamp (RFC 3339 or naive `YYYY-MM-DD HH:MM:SS[.fff]` in UTC)
pub fn parse_stored_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the two sorted participant identities
pub const ROOM_KEY_SEPARATOR: &str = "_";

/// Opaque user identity supplied by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Client-side identifier for a two-party conversation
///
/// Independent of the backend's numeric room id. Symmetric in its inputs:
/// `RoomKey::derive(a, b) == RoomKey::derive(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    /// Join both identities, sorted lexicographically, with the fixed separator
    pub fn derive(a: &Identity, b: &Identity) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}{}{}", first, ROOM_KEY_SEPARATOR, second))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend-owned numeric room id
pub type RoomId = i64;

/// The currently active room context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBinding {
    pub room_key: RoomKey,
    pub room_id: RoomId,
    pub peer: Identity,
}

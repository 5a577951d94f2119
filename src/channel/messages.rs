use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Identity, LandmarkFrame, RoomId, RoomKey};

/// Event names on the wire
pub mod events {
    pub const JOIN_ROOM: &str = "join-room";
    pub const LEAVE_ROOM: &str = "leave-room";
    pub const SEND_MESSAGE: &str = "send-message";
    pub const RECEIVE_MESSAGE: &str = "receive-message";
    pub const SEND_LANDMARKS: &str = "send-landmarks";
    pub const RECOGNITION_INTERIM: &str = "recognition-interim";
    pub const RECOGNITION_FINAL: &str = "recognition-final";

    /// Events relayed to us by the server
    pub const INBOUND: [&str; 3] = [RECEIVE_MESSAGE, RECOGNITION_INTERIM, RECOGNITION_FINAL];
}

/// Payload of `join-room` and `leave-room`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMembershipMessage {
    pub room_key: RoomKey,
    pub identity: Identity,
}

/// Chat message sent to the server (`send-message`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageMessage {
    pub room_key: RoomKey,
    pub room_id: RoomId,
    pub sender: Identity,
    pub text: String,
}

/// Chat message relayed by the server (`receive-message`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessageMessage {
    /// Room the server broadcast to, if it says so
    #[serde(default)]
    pub room_key: Option<RoomKey>,
    pub sender: Identity,
    pub sender_name: String,
    pub text: String,
    /// Server-formatted display time
    #[serde(default)]
    pub time: Option<String>,
}

/// Streamed capture frame or stop signal (`send-landmarks`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkMessage {
    pub room_key: RoomKey,
    pub room_id: RoomId,
    pub sender: Identity,
    /// `None` on the stop signal
    pub frame: Option<LandmarkFrame>,
    pub sequence: u64,
    pub stop: bool,
}

/// Interim recognized gloss (`recognition-interim`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionInterimMessage {
    #[serde(default)]
    pub room_key: Option<RoomKey>,
    pub gloss: String,
}

/// Assembled sentence (`recognition-final`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionFinalMessage {
    #[serde(default)]
    pub room_key: Option<RoomKey>,
    pub sentence: String,
}

/// Typed view of an inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Message(ReceiveMessageMessage),
    Interim(RecognitionInterimMessage),
    Final(RecognitionFinalMessage),
}

impl InboundEvent {
    /// Decode a raw inbound payload. Unknown event names yield `Ok(None)`.
    pub fn decode(event: &str, payload: &Value) -> serde_json::Result<Option<Self>> {
        let decoded = match event {
            events::RECEIVE_MESSAGE => Self::Message(serde_json::from_value(payload.clone())?),
            events::RECOGNITION_INTERIM => Self::Interim(serde_json::from_value(payload.clone())?),
            events::RECOGNITION_FINAL => Self::Final(serde_json::from_value(payload.clone())?),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }
}

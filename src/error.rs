//! Error types for chat sessions and sign capture
//!
//! Collaborator failures (backend, transport, camera) are translated into
//! these variants at the SessionManager / CapturePipeline boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Camera permission denied or device unavailable
    #[error("Camera access denied: {0}")]
    DeviceAccess(String),

    /// Camera disconnected while capturing
    #[error("Camera lost: {0}")]
    DeviceLost(String),

    /// Backend could not resolve or create the room
    #[error("Room resolution failed: {0}")]
    RoomResolution(String),

    /// Backend could not return the room's stored messages
    #[error("History unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("No active room, select a conversation partner first")]
    NoActiveRoom,

    #[error("Message channel is disconnected")]
    ChannelDisconnected,

    #[error("Cannot {operation} while {state}")]
    IllegalState {
        operation: &'static str,
        state: String,
    },

    #[error("Landmark frame has {actual} values, expected {expected}")]
    InvalidFrameLength { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::DeviceAccess(_) => "DEVICE_ACCESS",
            Error::DeviceLost(_) => "DEVICE_LOST",
            Error::RoomResolution(_) => "ROOM_RESOLUTION",
            Error::HistoryUnavailable(_) => "HISTORY_UNAVAILABLE",
            Error::NoActiveRoom => "NO_ACTIVE_ROOM",
            Error::ChannelDisconnected => "CHANNEL_DISCONNECTED",
            Error::IllegalState { .. } => "ILLEGAL_STATE",
            Error::InvalidFrameLength { .. } => "INVALID_FRAME",
            Error::Serialization(_) => "SERIALIZATION",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

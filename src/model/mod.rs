//! Shared data model: identities, rooms, messages and landmark frames

mod landmark;
mod message;
mod room;

pub use landmark::{
    LandmarkFrame, Point, PoseObservation, HAND_LANDMARK_COUNT, LANDMARK_FRAME_LEN,
    POSE_LANDMARK_INDICES,
};
pub use message::{parse_stored_timestamp, Message, MessageOrigin};
pub use room::{Identity, RoomBinding, RoomId, RoomKey, ROOM_KEY_SEPARATOR};

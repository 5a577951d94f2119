//! Message channel over a persistent event transport
//!
//! Carries room control (join/leave), chat messages, landmark frames and
//! recognition results between this client and the relay server.

mod client;
mod memory;
pub mod messages;
mod nats;
mod transport;

pub use client::{ConnectionHandler, EventHandler, MessageChannel};
pub use memory::MemoryTransport;
pub use messages::{
    events, InboundEvent, LandmarkMessage, ReceiveMessageMessage, RecognitionFinalMessage,
    RecognitionInterimMessage, RoomMembershipMessage, SendMessageMessage,
};
pub use nats::NatsTransport;
pub use transport::{Transport, TransportEvent};

pub mod capture;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod recognition;
pub mod session;

pub use capture::{CapturePipeline, CaptureState, CaptureStatus};
pub use channel::{MessageChannel, MemoryTransport, NatsTransport, Transport};
pub use client::{run_event_loop, CaptureParts, ChatClient, ClientEvent, ClientOptions};
pub use config::Config;
pub use error::{Error, Result};
pub use http::{create_router, AppState};
pub use model::{Identity, LandmarkFrame, Message, RoomBinding, RoomKey};
pub use recognition::ResultAggregator;
pub use session::{ChatBackend, HttpChatBackend, SessionManager, SessionState};

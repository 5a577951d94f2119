//! Local HTTP control API for a UI shell
//!
//! - GET /health - Health check
//! - POST /chat/bind - Select the conversation partner
//! - POST /chat/history - Load the bound room's history
//! - GET /chat/messages - Current message list
//! - POST /chat/send - Send a chat message
//! - POST /capture/{arm,start,stop,close} - Capture control
//! - GET /capture/status - Capture snapshot
//! - GET /recognition - Interim glosses and final sentences

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, RecognitionView};
pub use routes::create_router;
pub use state::AppState;

//! Conversation session
//!
//! This module provides the `SessionManager` that handles:
//! - Room resolution through the chat backend
//! - Joining and leaving rooms on the message channel
//! - History loading and ordering
//! - Live message relay for the bound room

mod backend;
mod history;
mod manager;

pub use backend::{ChatBackend, Friend, HttpChatBackend, StoredMessage, UserSummary};
pub use history::order_history;
pub use manager::{SessionManager, SessionState};

use crate::client::ChatClient;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single client; requests are applied one at a time, interleaved
    /// with queued channel events
    pub client: Arc<Mutex<ChatClient>>,
}

impl AppState {
    pub fn new(client: Arc<Mutex<ChatClient>>) -> Self {
        Self { client }
    }
}

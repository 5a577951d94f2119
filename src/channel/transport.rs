use anyhow::Result;
use tokio::sync::mpsc;

/// Something the transport delivered: an event or a connectivity change
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message { event: String, payload: Vec<u8> },
    Connected,
    Disconnected,
}

/// Persistent bidirectional event transport
///
/// Implementations:
/// - NATS: subject-per-event pub/sub
/// - Memory: in-process loopback for tests and offline runs
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Publish one event payload (JSON bytes)
    async fn publish(&self, event: &str, payload: Vec<u8>) -> Result<()>;

    /// Start receiving inbound events and connectivity changes
    ///
    /// Events must be yielded in the order the transport received them.
    /// Called once per channel.
    async fn subscribe(&self) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use super::transport::{Transport, TransportEvent};

/// In-process transport
///
/// Records every published event and lets the caller inject inbound events,
/// standing in for the relay server.
pub struct MemoryTransport {
    published: Mutex<Vec<(String, Value)>>,
    published_notify: Notify,
    inbound_tx: mpsc::Sender<TransportEvent>,
    inbound_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        Self {
            published: Mutex::new(Vec::new()),
            published_notify: Notify::new(),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        }
    }

    /// All events published so far, in order
    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Payloads published under one event name, in order
    pub fn published_named(&self, event: &str) -> Vec<Value> {
        self.published()
            .into_iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Wait until at least `count` payloads were published under `event`
    pub async fn wait_for(&self, event: &str, count: usize, limit: Duration) -> Result<Vec<Value>> {
        tokio::time::timeout(limit, async {
            loop {
                let notified = self.published_notify.notified();
                let payloads = self.published_named(event);
                if payloads.len() >= count {
                    return payloads;
                }
                notified.await;
            }
        })
        .await
        .with_context(|| format!("Timed out waiting for {} x {}", count, event))
    }

    /// Deliver an inbound event as if the server relayed it
    pub async fn inject(&self, event: &str, payload: Value) -> Result<()> {
        let payload = serde_json::to_vec(&payload)?;
        self.send(TransportEvent::Message {
            event: event.to_string(),
            payload,
        })
        .await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(TransportEvent::Disconnected).await
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.send(TransportEvent::Connected).await
    }

    async fn send(&self, event: TransportEvent) -> Result<()> {
        self.inbound_tx
            .send(event)
            .await
            .context("Memory transport receiver dropped")
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, event: &str, payload: Vec<u8>) -> Result<()> {
        let value: Value = serde_json::from_slice(&payload)?;
        {
            let mut published = match self.published.lock() {
                Ok(guard) => guard,
                Err(_) => bail!("Memory transport poisoned"),
            };
            published.push((event.to_string(), value));
        }
        self.published_notify.notify_waiters();
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<TransportEvent>> {
        let mut slot = match self.inbound_rx.lock() {
            Ok(guard) => guard,
            Err(_) => bail!("Memory transport poisoned"),
        };
        slot.take().context("Memory transport already subscribed")
    }

    fn name(&self) -> &str {
        "memory"
    }
}

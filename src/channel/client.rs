use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::transport::{Transport, TransportEvent};
use crate::error::{Error, Result};

/// Handler for one inbound event name
pub type EventHandler = Box<dyn Fn(&Value) + Send + Sync>;

/// Handler for a connectivity change
pub type ConnectionHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Handlers {
    events: HashMap<String, Vec<EventHandler>>,
    reconnect: Vec<ConnectionHandler>,
    disconnect: Vec<ConnectionHandler>,
}

/// Persistent bidirectional event channel
///
/// Handlers for an event name run in the order the transport delivered the
/// events; nothing is reordered, coalesced, queued or retried here. Retry
/// policy belongs to the callers.
///
/// Handlers run synchronously on the pump task and must not register new
/// handlers from inside a handler.
pub struct MessageChannel {
    transport: Arc<dyn Transport>,
    connected: AtomicBool,
    handlers: Mutex<Handlers>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl MessageChannel {
    /// Create a channel over a transport, initially connected
    ///
    /// Nothing is received until [`MessageChannel::open`] starts the pump.
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            connected: AtomicBool::new(true),
            handlers: Mutex::new(Handlers::default()),
            pump: Mutex::new(None),
        })
    }

    /// Subscribe to the transport and start delivering inbound events
    pub async fn open(self: &Arc<Self>) -> anyhow::Result<()> {
        let mut events = self.transport.subscribe().await?;

        info!("Message channel open over {}", self.transport.name());

        let channel = Arc::clone(self);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                channel.deliver(event);
            }
            info!("Message channel pump stopped");
        });

        if let Ok(mut slot) = self.pump.lock() {
            if let Some(old) = slot.replace(pump) {
                old.abort();
            }
        }

        Ok(())
    }

    /// Stop delivering events and mark the channel disconnected
    pub fn close(&self) {
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(pump) = slot.take() {
                pump.abort();
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("Message channel closed");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send one event
    ///
    /// Fails with `ChannelDisconnected` while the transport is down; the
    /// emission is not queued.
    pub async fn emit<T: Serialize>(&self, event: &str, payload: &T) -> Result<()> {
        if !self.is_connected() {
            warn!("Dropping {} emission, channel disconnected", event);
            return Err(Error::ChannelDisconnected);
        }

        let bytes = serde_json::to_vec(payload)?;

        self.transport.publish(event, bytes).await.map_err(|e| {
            error!("Failed to emit {}: {:#}", event, e);
            Error::ChannelDisconnected
        })
    }

    /// Register a handler for an inbound event name
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers
                .events
                .entry(event.to_string())
                .or_default()
                .push(Box::new(handler));
        }
    }

    pub fn on_reconnect<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.reconnect.push(Box::new(handler));
        }
    }

    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.disconnect.push(Box::new(handler));
        }
    }

    /// Apply one transport event: update connectivity or invoke handlers
    pub fn deliver(&self, event: TransportEvent) {
        let handlers = match self.handlers.lock() {
            Ok(handlers) => handlers,
            Err(_) => {
                error!("Handler registry poisoned, dropping event");
                return;
            }
        };

        match event {
            TransportEvent::Connected => {
                let was_connected = self.connected.swap(true, Ordering::SeqCst);
                if !was_connected {
                    info!("Message channel reconnected");
                    handlers.reconnect.iter().for_each(|h| h());
                }
            }
            TransportEvent::Disconnected => {
                let was_connected = self.connected.swap(false, Ordering::SeqCst);
                if was_connected {
                    warn!("Message channel disconnected");
                    handlers.disconnect.iter().for_each(|h| h());
                }
            }
            TransportEvent::Message { event, payload } => {
                let value: Value = match serde_json::from_slice(&payload) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Failed to parse {} payload: {}", event, e);
                        return;
                    }
                };

                match handlers.events.get(&event) {
                    Some(list) => list.iter().for_each(|h| h(&value)),
                    None => debug!("No handler for {}", event),
                }
            }
        }
    }
}

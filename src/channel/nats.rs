use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportEvent};
use crate::model::Identity;

/// NATS-backed transport
///
/// Outbound events go to `{prefix}.{event}`. Events relayed to this user
/// arrive on `{prefix}.inbox.{identity}.{event}`.
pub struct NatsTransport {
    client: Client,
    subject_prefix: String,
    identity: Identity,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
}

impl NatsTransport {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject_prefix: &str, identity: Identity) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let (events_tx, events_rx) = mpsc::channel(256);
        let callback_tx = events_tx.clone();

        let client = async_nats::ConnectOptions::new()
            .event_callback(move |event| {
                let tx = callback_tx.clone();
                async move {
                    let mapped = match event {
                        async_nats::Event::Connected => Some(TransportEvent::Connected),
                        async_nats::Event::Disconnected => Some(TransportEvent::Disconnected),
                        other => {
                            debug!("NATS event: {}", other);
                            None
                        }
                    };
                    if let Some(mapped) = mapped {
                        if tx.send(mapped).await.is_err() {
                            warn!("NATS connection event dropped, channel closed");
                        }
                    }
                }
            })
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subject_prefix: subject_prefix.to_string(),
            identity,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    fn outbound_subject(&self, event: &str) -> String {
        format!("{}.{}", self.subject_prefix, event)
    }

    fn inbox_subject(&self) -> String {
        format!("{}.inbox.{}.>", self.subject_prefix, self.identity)
    }
}

#[async_trait::async_trait]
impl Transport for NatsTransport {
    async fn publish(&self, event: &str, payload: Vec<u8>) -> Result<()> {
        let subject = self.outbound_subject(event);
        let size = payload.len();

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish event")?;

        debug!("Published {} ({} bytes)", subject, size);

        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<TransportEvent>> {
        let events_rx = self
            .events_rx
            .lock()
            .map_err(|_| anyhow::anyhow!("NATS transport poisoned"))?
            .take()
            .context("NATS transport already subscribed")?;

        let subject = self.inbox_subject();

        info!("Subscribing to inbound events on {}", subject);

        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to inbound events")?;

        info!("Subscribed to {}", subject);

        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let subject = msg.subject.to_string();
                let event = subject.rsplit('.').next().unwrap_or_default().to_string();

                let forwarded = TransportEvent::Message {
                    event,
                    payload: msg.payload.to_vec(),
                };
                if tx.send(forwarded).await.is_err() {
                    break;
                }
            }

            info!("Inbound subscription ended");
        });

        Ok(events_rx)
    }

    fn name(&self) -> &str {
        "nats"
    }
}

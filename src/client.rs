//! Chat client composition root
//!
//! Owns one `SessionManager`, one `CapturePipeline` and one
//! `ResultAggregator` on top of an explicitly created `MessageChannel`.
//! Inbound events, connection changes and capture notices all go through a
//! single queue and are applied one at a time.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::capture::{
    Camera, CaptureNotice, CapturePipeline, CaptureState, CaptureStatus, LandmarkExtractor,
    SchedulerFactory,
};
use crate::channel::{events, InboundEvent, MessageChannel};
use crate::error::{Error, Result};
use crate::model::{Identity, Message, RoomBinding};
use crate::recognition::ResultAggregator;
use crate::session::{ChatBackend, SessionManager, SessionState};

/// Everything that can change client state outside of a direct call
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Inbound(InboundEvent),
    Reconnected,
    Disconnected,
    Capture(CaptureNotice),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound on room resolution
    pub resolve_timeout: Duration,
    /// Send each recognized sentence to the bound room
    pub auto_send_final: bool,
    /// Sender name on recognized sentences, the identity when blank
    pub display_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(5),
            auto_send_final: false,
            display_name: String::new(),
        }
    }
}

/// Capture collaborators handed to the pipeline
pub struct CaptureParts {
    pub camera: Arc<dyn Camera>,
    pub extractor: Arc<dyn LandmarkExtractor>,
    pub schedulers: SchedulerFactory,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub identity: Identity,
    pub session: SessionState,
    pub binding: Option<RoomBinding>,
    pub connected: bool,
    pub capture: CaptureStatus,
}

pub struct ChatClient {
    channel: Arc<MessageChannel>,
    session: SessionManager,
    capture: CapturePipeline,
    recognition: ResultAggregator,
    auto_send_final: bool,
}

impl ChatClient {
    /// Wire the components together and route channel events into the
    /// returned queue. The caller drains it with [`ChatClient::handle_event`]
    /// (or [`run_event_loop`]).
    pub fn new(
        identity: Identity,
        channel: Arc<MessageChannel>,
        backend: Arc<dyn ChatBackend>,
        parts: CaptureParts,
        options: ClientOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        for event in events::INBOUND {
            let tx = tx.clone();
            channel.on(event, move |payload| {
                match InboundEvent::decode(event, payload) {
                    Ok(Some(inbound)) => {
                        let _ = tx.send(ClientEvent::Inbound(inbound));
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Malformed {} payload: {}", event, e),
                }
            });
        }

        let reconnect_tx = tx.clone();
        channel.on_reconnect(move || {
            let _ = reconnect_tx.send(ClientEvent::Reconnected);
        });

        let disconnect_tx = tx.clone();
        channel.on_disconnect(move || {
            let _ = disconnect_tx.send(ClientEvent::Disconnected);
        });

        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        let capture_tx = tx;
        tokio::spawn(async move {
            while let Some(notice) = notice_rx.recv().await {
                if capture_tx.send(ClientEvent::Capture(notice)).is_err() {
                    break;
                }
            }
        });

        let session = SessionManager::new(
            identity.clone(),
            Arc::clone(&channel),
            backend,
            options.resolve_timeout,
        );

        let capture = CapturePipeline::new(
            identity.clone(),
            parts.camera,
            parts.extractor,
            Arc::clone(&channel),
            parts.schedulers,
        )
        .with_notices(notice_tx);

        let client = Self {
            channel,
            session,
            capture,
            recognition: ResultAggregator::new(identity, options.display_name),
            auto_send_final: options.auto_send_final,
        };

        (client, rx)
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn capture(&self) -> &CapturePipeline {
        &self.capture
    }

    pub fn recognition(&self) -> &ResultAggregator {
        &self.recognition
    }

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            identity: self.session.identity().clone(),
            session: self.session.state(),
            binding: self.session.binding().cloned(),
            connected: self.channel.is_connected(),
            capture: self.capture.status(),
        }
    }

    /// Switch the conversation partner
    ///
    /// A running capture belongs to the old room, so it is closed first.
    pub async fn bind(&mut self, peer: Identity) -> Result<RoomBinding> {
        if matches!(
            self.capture.state(),
            CaptureState::Capturing | CaptureState::Stopping
        ) {
            info!("Closing capture before switching rooms");
            self.capture.close().await;
        }

        let result = self.session.bind(peer).await;

        self.recognition
            .reset_for_room(self.session.binding().map(|b| b.room_key.clone()));

        result
    }

    /// Load the bound room's stored messages
    pub async fn load_history(&mut self) -> Result<Vec<Message>> {
        let room_id = self
            .session
            .binding()
            .map(|b| b.room_id)
            .ok_or(Error::NoActiveRoom)?;

        self.session.load_history(room_id).await
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        self.session.send(text).await
    }

    pub async fn arm(&mut self) -> Result<CaptureState> {
        self.capture.arm().await
    }

    pub async fn start_capture(&mut self) -> Result<CaptureState> {
        let was_capturing = self.capture.state() == CaptureState::Capturing;
        let state = self.capture.start(self.session.binding()).await?;
        if !was_capturing {
            self.recognition.begin_cycle();
        }
        Ok(state)
    }

    pub async fn stop_capture(&mut self) -> Result<CaptureState> {
        let state = self.capture.stop().await?;
        self.recognition.end_cycle();
        Ok(state)
    }

    pub async fn close_capture(&mut self) {
        self.capture.close().await;
    }

    /// Apply one queued event
    pub async fn handle_event(&mut self, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::Inbound(InboundEvent::Message(message)) => {
                self.session.on_incoming_message(message);
            }
            ClientEvent::Inbound(InboundEvent::Interim(interim)) => {
                self.recognition.on_interim(interim);
            }
            ClientEvent::Inbound(InboundEvent::Final(sentence)) => {
                if let Some(message) = self.recognition.on_final(sentence) {
                    if self.auto_send_final {
                        self.session.send(&message.text).await?;
                    }
                }
            }
            ClientEvent::Reconnected => {
                self.session.rejoin().await?;
            }
            ClientEvent::Disconnected => {
                warn!("Channel down, emissions fail until it reconnects");
            }
            ClientEvent::Capture(notice) => {
                self.capture.on_notice(notice).await?;
            }
        }

        Ok(())
    }

    /// Stop capturing and release everything held
    pub async fn shutdown(&mut self) {
        self.capture.close().await;
        self.channel.close();
    }
}

/// Drain the client's event queue until every sender is gone
pub async fn run_event_loop(
    client: Arc<Mutex<ChatClient>>,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        debug!("Applying {:?}", event);
        let mut client = client.lock().await;
        if let Err(e) = client.handle_event(event).await {
            error!("Event handling failed: {}", e);
        }
    }

    info!("Client event loop finished");
}

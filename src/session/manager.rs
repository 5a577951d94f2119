use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::backend::ChatBackend;
use super::history::order_history;
use crate::channel::{
    events, MessageChannel, ReceiveMessageMessage, RoomMembershipMessage, SendMessageMessage,
};
use crate::error::{Error, Result};
use crate::model::{Identity, Message, MessageOrigin, RoomBinding, RoomId, RoomKey};

/// Whether a room is currently bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Unbound,
    Bound,
}

/// Owns the active room binding and the bound room's message list
///
/// There is no timeout back to `Unbound`: a bound session stays bound until
/// the next `bind` leaves it.
pub struct SessionManager {
    identity: Identity,
    channel: Arc<MessageChannel>,
    backend: Arc<dyn ChatBackend>,
    resolve_timeout: Duration,
    binding: Option<RoomBinding>,
    messages: Vec<Message>,
}

impl SessionManager {
    pub fn new(
        identity: Identity,
        channel: Arc<MessageChannel>,
        backend: Arc<dyn ChatBackend>,
        resolve_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            channel,
            backend,
            resolve_timeout,
            binding: None,
            messages: Vec::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn binding(&self) -> Option<&RoomBinding> {
        self.binding.as_ref()
    }

    pub fn state(&self) -> SessionState {
        match self.binding {
            Some(_) => SessionState::Bound,
            None => SessionState::Unbound,
        }
    }

    /// Messages of the bound room: history first, then live arrivals
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Switch the conversation to `peer`
    ///
    /// Leaves the current room first (best effort), resolves the room id,
    /// then joins. The new binding is installed only after both the
    /// resolution and the join emission succeeded; on failure the session
    /// is left unbound.
    pub async fn bind(&mut self, peer: Identity) -> Result<RoomBinding> {
        if let Some(previous) = self.binding.take() {
            self.messages.clear();
            self.emit_leave(&previous.room_key).await;
        }

        let resolved = tokio::time::timeout(
            self.resolve_timeout,
            self.backend.resolve_room(&self.identity, &peer),
        )
        .await;

        let room_id = match resolved {
            Ok(Ok(room_id)) => room_id,
            Ok(Err(e)) => {
                error!("Failed to resolve room with {}: {:#}", peer, e);
                return Err(Error::RoomResolution(format!("{:#}", e)));
            }
            Err(_) => {
                error!("Room resolution with {} timed out", peer);
                return Err(Error::RoomResolution(format!(
                    "timed out after {:?}",
                    self.resolve_timeout
                )));
            }
        };

        let room_key = RoomKey::derive(&self.identity, &peer);

        self.channel
            .emit(
                events::JOIN_ROOM,
                &RoomMembershipMessage {
                    room_key: room_key.clone(),
                    identity: self.identity.clone(),
                },
            )
            .await?;

        let binding = RoomBinding {
            room_key,
            room_id,
            peer,
        };

        info!(
            "Bound to room {} (id {}) with {}",
            binding.room_key, binding.room_id, binding.peer
        );

        self.binding = Some(binding.clone());

        Ok(binding)
    }

    /// Fetch the stored messages of a room, oldest first
    ///
    /// When `room_id` is the bound room, the history replaces the history
    /// part of the message list; live messages already received stay after it.
    pub async fn load_history(&mut self, room_id: RoomId) -> Result<Vec<Message>> {
        let stored = self.backend.fetch_history(room_id).await.map_err(|e| {
            error!("Failed to load history for room {}: {:#}", room_id, e);
            Error::HistoryUnavailable(format!("{:#}", e))
        })?;

        let history = order_history(stored);

        let is_bound_room = self
            .binding
            .as_ref()
            .is_some_and(|binding| binding.room_id == room_id);

        if is_bound_room {
            let live: Vec<Message> = self
                .messages
                .drain(..)
                .filter(|m| m.origin == MessageOrigin::Live)
                .collect();
            self.messages = history.clone();
            self.messages.extend(live);
        }

        info!("Loaded {} history messages for room {}", history.len(), room_id);

        Ok(history)
    }

    /// Send a chat message to the bound room
    ///
    /// The message list is not touched; the server echoes our own message
    /// back through the channel. Empty text is ignored.
    pub async fn send(&self, text: &str) -> Result<()> {
        let binding = self.binding.as_ref().ok_or(Error::NoActiveRoom)?;

        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring empty message");
            return Ok(());
        }

        self.channel
            .emit(
                events::SEND_MESSAGE,
                &SendMessageMessage {
                    room_key: binding.room_key.clone(),
                    room_id: binding.room_id,
                    sender: self.identity.clone(),
                    text: text.to_string(),
                },
            )
            .await?;

        info!("Sent message to {}", binding.room_key);

        Ok(())
    }

    /// Append a relayed message if it belongs to the bound room
    ///
    /// Returns whether the message was appended.
    pub fn on_incoming_message(&mut self, event: ReceiveMessageMessage) -> bool {
        let Some(binding) = self.binding.as_ref() else {
            debug!("Discarding message from {}, no room bound", event.sender);
            return false;
        };

        if let Some(room_key) = &event.room_key {
            if room_key != &binding.room_key {
                debug!(
                    "Discarding message for {} while bound to {}",
                    room_key, binding.room_key
                );
                return false;
            }
        }

        self.messages.push(Message::live(
            event.sender,
            event.sender_name,
            event.text,
            event.time,
        ));

        true
    }

    /// Re-emit the join for the bound room (safe to repeat after reconnect)
    pub async fn rejoin(&self) -> Result<()> {
        let Some(binding) = self.binding.as_ref() else {
            return Ok(());
        };

        self.channel
            .emit(
                events::JOIN_ROOM,
                &RoomMembershipMessage {
                    room_key: binding.room_key.clone(),
                    identity: self.identity.clone(),
                },
            )
            .await?;

        info!("Rejoined room {}", binding.room_key);

        Ok(())
    }

    async fn emit_leave(&self, room_key: &RoomKey) {
        let payload = RoomMembershipMessage {
            room_key: room_key.clone(),
            identity: self.identity.clone(),
        };

        match self.channel.emit(events::LEAVE_ROOM, &payload).await {
            Ok(()) => info!("Left room {}", room_key),
            Err(e) => warn!("Failed to leave room {}: {}", room_key, e),
        }
    }
}

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::channel::{RecognitionFinalMessage, RecognitionInterimMessage};
use crate::model::{Identity, Message, RoomKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionKind {
    Interim,
    Final,
}

/// One recognition result for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionEntry {
    pub kind: RecognitionKind,
    pub text: String,
    /// Who signed it, set on finals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// Assembles incremental recognition events into conversation entries
///
/// Interim glosses are transient and cleared when the final sentence for
/// the same room and capture cycle arrives. Finals are kept.
///
/// Recognition runs after each stop signal, so the sentence for one cycle
/// may arrive while the next cycle is already capturing. Finals answer stop
/// signals in order; only the one answering the latest cycle closes it.
#[derive(Debug)]
pub struct ResultAggregator {
    identity: Identity,
    display_name: String,
    room_key: Option<RoomKey>,
    /// A cycle is between `begin_cycle` and `end_cycle`
    capturing: bool,
    /// Stop signals sent whose sentence has not arrived
    outstanding: usize,
    /// The latest cycle got its sentence; its late interims are stale
    finalized: bool,
    interim: Vec<RecognitionEntry>,
    finals: Vec<RecognitionEntry>,
}

impl ResultAggregator {
    /// `display_name` labels our own recognized sentences; empty falls back
    /// to the identity
    pub fn new(identity: Identity, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let display_name = if display_name.trim().is_empty() {
            identity.to_string()
        } else {
            display_name
        };

        Self {
            identity,
            display_name,
            room_key: None,
            capturing: false,
            outstanding: 0,
            finalized: false,
            interim: Vec::new(),
            finals: Vec::new(),
        }
    }

    /// Track a newly bound room, dropping everything from the previous one
    pub fn reset_for_room(&mut self, room_key: Option<RoomKey>) {
        self.room_key = room_key;
        self.capturing = false;
        self.outstanding = 0;
        self.finalized = false;
        self.interim.clear();
        self.finals.clear();
    }

    /// A capture cycle started
    pub fn begin_cycle(&mut self) {
        self.capturing = true;
        self.finalized = false;
        self.interim.clear();
    }

    /// The stop signal for the current cycle was emitted
    pub fn end_cycle(&mut self) {
        self.capturing = false;
        self.outstanding += 1;
    }

    /// Whether a stop signal went out and its sentence has not arrived yet
    pub fn awaiting_final(&self) -> bool {
        self.outstanding > 0
    }

    /// Transient entries of the current cycle
    pub fn interim(&self) -> &[RecognitionEntry] {
        &self.interim
    }

    /// Permanent sentences, oldest first
    pub fn finals(&self) -> &[RecognitionEntry] {
        &self.finals
    }

    /// Returns whether the gloss was accepted
    pub fn on_interim(&mut self, event: RecognitionInterimMessage) -> bool {
        if !self.is_current_room(event.room_key.as_ref()) {
            debug!("Discarding interim gloss for another room");
            return false;
        }

        if self.finalized {
            debug!("Discarding stale interim gloss {:?}", event.gloss);
            return false;
        }

        self.interim.push(RecognitionEntry {
            kind: RecognitionKind::Interim,
            text: event.gloss,
            sender_name: None,
        });

        true
    }

    /// Record the final sentence
    ///
    /// Supersedes pending interims only when it answers the latest cycle;
    /// a sentence for an earlier cycle leaves the running one alone.
    /// Returns the sentence as a live message from ourselves, or `None` if
    /// the event belongs to another room.
    pub fn on_final(&mut self, event: RecognitionFinalMessage) -> Option<Message> {
        if !self.is_current_room(event.room_key.as_ref()) {
            debug!("Discarding final sentence for another room");
            return None;
        }

        // With no stop outstanding the sentence belongs to the running cycle
        let answers_latest = match self.outstanding {
            0 => true,
            1 => !self.capturing,
            _ => false,
        };
        self.outstanding = self.outstanding.saturating_sub(1);

        if answers_latest {
            self.interim.clear();
            self.finalized = true;
        } else {
            debug!("Sentence answers an earlier cycle, keeping current interims");
        }

        info!("Recognized sentence: {}", event.sentence);

        self.finals.push(RecognitionEntry {
            kind: RecognitionKind::Final,
            text: event.sentence.clone(),
            sender_name: Some(self.display_name.clone()),
        });

        Some(Message::live(
            self.identity.clone(),
            self.display_name.clone(),
            event.sentence,
            None,
        ))
    }

    fn is_current_room(&self, room_key: Option<&RoomKey>) -> bool {
        match (room_key, self.room_key.as_ref()) {
            (Some(event_room), Some(current)) => event_room == current,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

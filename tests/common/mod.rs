#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use signtalk::capture::{
    Camera, CapturePipeline, DeviceError, LandmarkExtractor, ManualTicker, VideoFrame,
};
use signtalk::channel::{MemoryTransport, MessageChannel};
use signtalk::client::{CaptureParts, ChatClient, ClientEvent, ClientOptions};
use signtalk::model::{Identity, Point, PoseObservation, RoomBinding, RoomId, RoomKey};
use signtalk::session::{ChatBackend, SessionManager, StoredMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

pub const WAIT: Duration = Duration::from_secs(2);

/// Camera that counts acquisitions and can be told to fail
#[derive(Default)]
pub struct FakeCamera {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    deny: AtomicBool,
    lost: AtomicBool,
    stuck: AtomicBool,
}

impl FakeCamera {
    pub fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    pub fn lose(&self) {
        self.lost.store(true, Ordering::SeqCst);
    }

    /// Frame reads never complete from now on
    pub fn hang(&self) {
        self.stuck.store(true, Ordering::SeqCst);
    }

    /// Acquisitions not yet released
    pub fn held(&self) -> usize {
        self.acquired.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Camera for FakeCamera {
    async fn open(&self) -> Result<(), DeviceError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied("user declined".to_string()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_frame(&self) -> Result<VideoFrame, DeviceError> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected("unplugged".to_string()));
        }
        if self.stuck.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(VideoFrame {
            data: b"frame".to_vec(),
            width: 640,
            height: 480,
            timestamp_ms: 0,
        })
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Extractor returning a right hand only; optionally blocks on a gate
pub struct FakeExtractor {
    gate: Option<Semaphore>,
    fail_init: AtomicBool,
    pub extracted: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            gate: None,
            fail_init: AtomicBool::new(false),
            extracted: AtomicUsize::new(0),
        }
    }

    /// Each extraction waits for one `release`
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn release(&self, extractions: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(extractions);
        }
    }

    pub fn fail_init(&self) {
        self.fail_init.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl LandmarkExtractor for FakeExtractor {
    async fn initialize(&self) -> Result<()> {
        if self.fail_init.load(Ordering::SeqCst) {
            bail!("model file missing");
        }
        Ok(())
    }

    async fn extract(&self, _frame: &VideoFrame) -> Result<Option<PoseObservation>> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        self.extracted.fetch_add(1, Ordering::SeqCst);

        let hand = (0..21)
            .map(|i| {
                Some(Point {
                    x: i as f32 / 100.0,
                    y: 0.5,
                })
            })
            .collect();

        Ok(Some(PoseObservation {
            pose: None,
            left_hand: None,
            right_hand: Some(hand),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Backend with one deterministic room id per pair
#[derive(Default)]
pub struct FakeBackend {
    pub resolve_calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    rooms: Mutex<HashMap<String, RoomId>>,
    history: Mutex<HashMap<RoomId, Vec<StoredMessage>>>,
}

impl FakeBackend {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
    }

    pub fn set_history(&self, room_id: RoomId, stored: Vec<StoredMessage>) {
        if let Ok(mut history) = self.history.lock() {
            history.insert(room_id, stored);
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for FakeBackend {
    async fn resolve_room(&self, me: &Identity, peer: &Identity) -> Result<RoomId> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            bail!("backend returned 500");
        }

        let key = RoomKey::derive(me, peer).to_string();
        let mut rooms = self.rooms.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        let next = rooms.len() as RoomId + 1;
        Ok(*rooms.entry(key).or_insert(next))
    }

    async fn fetch_history(&self, room_id: RoomId) -> Result<Vec<StoredMessage>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("backend returned 500");
        }
        let history = self.history.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(history.get(&room_id).cloned().unwrap_or_default())
    }
}

pub fn stored(message: &str, sender: &str, date: &str) -> StoredMessage {
    StoredMessage {
        message: message.to_string(),
        sender: Identity::new(sender),
        sender_name: sender.to_uppercase(),
        date: date.to_string(),
    }
}

pub fn binding(me: &str, peer: &str, room_id: RoomId) -> RoomBinding {
    RoomBinding {
        room_key: RoomKey::derive(&Identity::new(me), &Identity::new(peer)),
        room_id,
        peer: Identity::new(peer),
    }
}

/// Everything wired over an in-memory transport for user "alice"
pub struct Harness {
    pub me: Identity,
    pub transport: Arc<MemoryTransport>,
    pub channel: Arc<MessageChannel>,
    pub backend: Arc<FakeBackend>,
    pub camera: Arc<FakeCamera>,
    pub extractor: Arc<FakeExtractor>,
    pub ticker: ManualTicker,
}

impl Harness {
    pub async fn new() -> Result<Self> {
        Self::with_extractor(FakeExtractor::new()).await
    }

    pub async fn with_extractor(extractor: FakeExtractor) -> Result<Self> {
        let transport = Arc::new(MemoryTransport::new());
        let channel = MessageChannel::new(transport.clone());
        channel.open().await?;

        Ok(Self {
            me: Identity::new("alice"),
            transport,
            channel,
            backend: Arc::new(FakeBackend::default()),
            camera: Arc::new(FakeCamera::default()),
            extractor: Arc::new(extractor),
            ticker: ManualTicker::new(),
        })
    }

    pub fn session(&self) -> SessionManager {
        self.session_with_timeout(Duration::from_secs(1))
    }

    pub fn session_with_timeout(&self, timeout: Duration) -> SessionManager {
        SessionManager::new(
            self.me.clone(),
            Arc::clone(&self.channel),
            self.backend.clone(),
            timeout,
        )
    }

    pub fn pipeline(&self) -> CapturePipeline {
        CapturePipeline::new(
            self.me.clone(),
            self.camera.clone(),
            self.extractor.clone(),
            Arc::clone(&self.channel),
            self.ticker.factory(),
        )
    }

    pub fn client(&self, options: ClientOptions) -> (ChatClient, mpsc::UnboundedReceiver<ClientEvent>) {
        ChatClient::new(
            self.me.clone(),
            Arc::clone(&self.channel),
            self.backend.clone(),
            CaptureParts {
                camera: self.camera.clone(),
                extractor: self.extractor.clone(),
                schedulers: self.ticker.factory(),
            },
            options,
        )
    }
}

/// Poll until `check` holds
pub async fn eventually<F>(what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .with_context(|| format!("Timed out waiting for {}", what))
}

/// Next queued client event
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Result<ClientEvent> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .context("Timed out waiting for client event")?
        .context("Client event queue closed")
}

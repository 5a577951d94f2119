use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::device::{Camera, CameraLease, DeviceError};
use super::extractor::LandmarkExtractor;
use super::scheduler::{FrameScheduler, SchedulerFactory};
use crate::channel::{events, LandmarkMessage, MessageChannel};
use crate::error::{Error, Result};
use crate::model::{Identity, LandmarkFrame, PoseObservation, RoomBinding, RoomKey};

/// Capture pipeline state
///
/// `Idle` always means no camera is held. After `stop` the camera is still
/// held, so the pipeline settles back in `Armed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Armed,
    Capturing,
    Stopping,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::Armed => "armed",
            CaptureState::Capturing => "capturing",
            CaptureState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Raised by the frame loop outside of any pipeline call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureNotice {
    DeviceLost { session_id: Uuid, reason: String },
}

/// Snapshot of the pipeline for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub session_id: Option<Uuid>,
    pub frame_sequence: u64,
    pub room_key: Option<RoomKey>,
    /// Why the last capture ended abnormally, cleared by the next `arm`
    pub last_error: Option<String>,
}

/// One capture cycle, from `start` to `stop`/`close`
struct CaptureSession {
    id: Uuid,
    binding: RoomBinding,
    frame_sequence: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<LoopExit>,
}

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum LoopExit {
    Stopped,
    SchedulerEnded,
    DeviceLost(String),
}

/// Camera-to-landmark-frame pipeline
///
/// Owns the camera lease and the single active capture session. Only `arm`
/// and `close` acquire or release the camera.
pub struct CapturePipeline {
    identity: Identity,
    camera: Arc<dyn Camera>,
    extractor: Arc<dyn LandmarkExtractor>,
    channel: Arc<MessageChannel>,
    schedulers: SchedulerFactory,
    notices: Option<mpsc::UnboundedSender<CaptureNotice>>,
    state: CaptureState,
    lease: Option<CameraLease>,
    extractor_ready: bool,
    session: Option<CaptureSession>,
    stop_timeout: Duration,
    last_error: Option<String>,
}

impl CapturePipeline {
    pub fn new(
        identity: Identity,
        camera: Arc<dyn Camera>,
        extractor: Arc<dyn LandmarkExtractor>,
        channel: Arc<MessageChannel>,
        schedulers: SchedulerFactory,
    ) -> Self {
        Self {
            identity,
            camera,
            extractor,
            channel,
            schedulers,
            notices: None,
            state: CaptureState::Idle,
            lease: None,
            extractor_ready: false,
            session: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            last_error: None,
        }
    }

    /// Report device loss detected by the frame loop on this sender
    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<CaptureNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// How long `stop` waits for the frame loop before tearing it down
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn holds_camera(&self) -> bool {
        self.lease.is_some()
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            state: self.state,
            session_id: self.session.as_ref().map(|s| s.id),
            frame_sequence: self
                .session
                .as_ref()
                .map(|s| s.frame_sequence.load(Ordering::SeqCst))
                .unwrap_or(0),
            room_key: self.session.as_ref().map(|s| s.binding.room_key.clone()),
            last_error: self.last_error.clone(),
        }
    }

    /// Acquire the camera and initialize the extractor
    ///
    /// On any failure the camera is released and the state stays `Idle`.
    pub async fn arm(&mut self) -> Result<CaptureState> {
        match self.state {
            CaptureState::Idle => {}
            CaptureState::Armed => return Ok(self.state),
            state => {
                return Err(Error::IllegalState {
                    operation: "arm",
                    state: state.to_string(),
                })
            }
        }

        info!("Arming capture on {}", self.camera.name());
        self.last_error = None;

        let lease = CameraLease::acquire(Arc::clone(&self.camera))
            .await
            .map_err(|e| {
                error!("Camera acquisition failed: {}", e);
                Error::DeviceAccess(e.to_string())
            })?;

        if !self.extractor_ready {
            if let Err(e) = self.extractor.initialize().await {
                error!("Landmark extractor {} failed to initialize: {:#}", self.extractor.name(), e);
                // Lease drops here, releasing the camera
                return Err(Error::DeviceAccess(format!(
                    "landmark extractor unavailable: {:#}",
                    e
                )));
            }
            self.extractor_ready = true;
        }

        self.lease = Some(lease);
        self.state = CaptureState::Armed;

        info!("Capture armed");

        Ok(self.state)
    }

    /// Begin a capture cycle streaming frames to `binding`'s room
    ///
    /// A no-op while already capturing.
    pub async fn start(&mut self, binding: Option<&RoomBinding>) -> Result<CaptureState> {
        match self.state {
            CaptureState::Capturing => {
                warn!("Capture already started");
                return Ok(self.state);
            }
            CaptureState::Armed => {}
            state => {
                return Err(Error::IllegalState {
                    operation: "start",
                    state: state.to_string(),
                })
            }
        }

        let binding = binding.ok_or(Error::NoActiveRoom)?.clone();

        let id = Uuid::new_v4();
        let frame_sequence = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());

        let frame_loop = FrameLoop {
            session_id: id,
            sink: FrameSink {
                sender: self.identity.clone(),
                binding: binding.clone(),
                channel: Arc::clone(&self.channel),
            },
            camera: Arc::clone(&self.camera),
            extractor: Arc::clone(&self.extractor),
            scheduler: (self.schedulers)(),
            frame_sequence: Arc::clone(&frame_sequence),
            running: Arc::clone(&running),
            wake: Arc::clone(&wake),
            notices: self.notices.clone(),
        };

        let task = tokio::spawn(frame_loop.run());

        info!("Capture {} started for room {}", id, binding.room_key);

        self.session = Some(CaptureSession {
            id,
            binding,
            frame_sequence,
            running,
            wake,
            task,
        });
        self.state = CaptureState::Capturing;

        Ok(self.state)
    }

    /// End the capture cycle and ask the server to recognize it
    ///
    /// Frames still being extracted are discarded. Emits the stop signal
    /// after the loop has fully stopped, so no frame follows it. A loop that
    /// does not stop within the stop timeout is aborted and the pipeline
    /// closed.
    pub async fn stop(&mut self) -> Result<CaptureState> {
        if self.state != CaptureState::Capturing {
            return Err(Error::IllegalState {
                operation: "stop",
                state: self.state.to_string(),
            });
        }

        let Some(session) = self.session.take() else {
            self.state = CaptureState::Armed;
            return Err(Error::IllegalState {
                operation: "stop",
                state: "capturing without a session".to_string(),
            });
        };

        self.state = CaptureState::Stopping;
        info!("Stopping capture {}", session.id);

        session.running.store(false, Ordering::SeqCst);
        session.wake.notify_one();

        let mut task = session.task;
        let exit = match tokio::time::timeout(self.stop_timeout, &mut task).await {
            Ok(Ok(exit)) => exit,
            Ok(Err(e)) => {
                error!("Capture loop panicked: {}", e);
                LoopExit::Stopped
            }
            Err(_) => {
                task.abort();
                let reason = format!(
                    "capture loop did not stop within {}ms",
                    self.stop_timeout.as_millis()
                );
                error!("Capture {}: {}", session.id, reason);
                self.fail(reason.clone()).await;
                return Err(Error::DeviceLost(reason));
            }
        };

        if let LoopExit::DeviceLost(reason) = exit {
            self.fail(reason.clone()).await;
            return Err(Error::DeviceLost(reason));
        }

        let sequence = session.frame_sequence.load(Ordering::SeqCst);
        self.state = CaptureState::Armed;

        self.channel
            .emit(
                events::SEND_LANDMARKS,
                &LandmarkMessage {
                    room_key: session.binding.room_key.clone(),
                    room_id: session.binding.room_id,
                    sender: self.identity.clone(),
                    frame: None,
                    sequence,
                    stop: true,
                },
            )
            .await?;

        info!("Capture {} stopped after {} frames", session.id, sequence);

        Ok(self.state)
    }

    /// Tear everything down: stop the loop without a stop signal, release
    /// the camera, return to `Idle`. Valid from any state.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.running.store(false, Ordering::SeqCst);
            session.wake.notify_one();
            session.task.abort();
            if let Err(e) = session.task.await {
                if !e.is_cancelled() {
                    error!("Capture loop panicked: {}", e);
                }
            }
            info!("Capture {} discarded", session.id);
        }

        self.lease.take();
        self.state = CaptureState::Idle;

        info!("Capture closed");
    }

    async fn fail(&mut self, reason: String) {
        self.close().await;
        self.last_error = Some(reason);
    }

    /// Apply a device-loss notice from the frame loop
    ///
    /// Closes the pipeline and surfaces `DeviceLost` if the notice belongs
    /// to the current session; stale notices are ignored.
    pub async fn on_notice(&mut self, notice: CaptureNotice) -> Result<()> {
        match notice {
            CaptureNotice::DeviceLost { session_id, reason } => {
                let current = self.session.as_ref().map(|s| s.id);
                if current != Some(session_id) {
                    debug!("Ignoring device loss for finished capture {}", session_id);
                    return Ok(());
                }

                warn!("Camera lost during capture {}: {}", session_id, reason);
                self.fail(reason.clone()).await;
                Err(Error::DeviceLost(reason))
            }
        }
    }
}

type Extraction = (u64, anyhow::Result<Option<PoseObservation>>);

async fn next_extraction(
    slot: &mut Option<JoinHandle<Extraction>>,
) -> std::result::Result<Extraction, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Everything the per-frame loop needs, moved into its task
struct FrameLoop {
    session_id: Uuid,
    sink: FrameSink,
    camera: Arc<dyn Camera>,
    extractor: Arc<dyn LandmarkExtractor>,
    scheduler: Box<dyn FrameScheduler>,
    frame_sequence: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    notices: Option<mpsc::UnboundedSender<CaptureNotice>>,
}

impl FrameLoop {
    /// One iteration per tick. A tick that arrives while the previous
    /// extraction is pending drops its frame; the sequence still advances.
    async fn run(mut self) -> LoopExit {
        debug!("Capture loop {} running", self.session_id);

        let mut in_flight: Option<JoinHandle<Extraction>> = None;

        let exit = loop {
            tokio::select! {
                biased;

                _ = self.wake.notified() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break LoopExit::Stopped;
                    }
                }

                joined = next_extraction(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    if !self.running.load(Ordering::SeqCst) {
                        break LoopExit::Stopped;
                    }
                    self.sink.emit_extraction(joined).await;
                }

                ticked = self.scheduler.next_tick() => {
                    if !ticked {
                        break LoopExit::SchedulerEnded;
                    }
                    if !self.running.load(Ordering::SeqCst) {
                        break LoopExit::Stopped;
                    }

                    let sequence = self.frame_sequence.fetch_add(1, Ordering::SeqCst) + 1;

                    if in_flight.is_some() {
                        debug!("Dropping frame {}, extraction still pending", sequence);
                        continue;
                    }

                    let frame = match self.camera.read_frame().await {
                        Ok(frame) => frame,
                        Err(DeviceError::Disconnected(reason)) => {
                            if let Some(notices) = &self.notices {
                                let _ = notices.send(CaptureNotice::DeviceLost {
                                    session_id: self.session_id,
                                    reason: reason.clone(),
                                });
                            }
                            break LoopExit::DeviceLost(reason);
                        }
                        Err(e) => {
                            warn!("Skipping frame {}: {}", sequence, e);
                            continue;
                        }
                    };

                    let extractor = Arc::clone(&self.extractor);
                    in_flight = Some(tokio::spawn(async move {
                        let result = extractor.extract(&frame).await;
                        (sequence, result)
                    }));
                }
            }
        };

        debug!("Capture loop {} exited: {:?}", self.session_id, exit);

        exit
    }
}

/// Where finished extractions go
struct FrameSink {
    sender: Identity,
    binding: RoomBinding,
    channel: Arc<MessageChannel>,
}

impl FrameSink {
    async fn emit_extraction(&self, joined: std::result::Result<Extraction, JoinError>) {
        let (sequence, result) = match joined {
            Ok(extraction) => extraction,
            Err(e) => {
                error!("Extraction task failed: {}", e);
                return;
            }
        };

        let observation = match result {
            Ok(Some(observation)) => observation,
            Ok(None) => {
                debug!("No landmarks in frame {}", sequence);
                return;
            }
            Err(e) => {
                warn!("Landmark extraction failed for frame {}: {:#}", sequence, e);
                return;
            }
        };

        let message = LandmarkMessage {
            room_key: self.binding.room_key.clone(),
            room_id: self.binding.room_id,
            sender: self.sender.clone(),
            frame: Some(LandmarkFrame::from_observation(&observation)),
            sequence,
            stop: false,
        };

        if let Err(e) = self.channel.emit(events::SEND_LANDMARKS, &message).await {
            warn!("Failed to send frame {}: {}", sequence, e);
        }
    }
}

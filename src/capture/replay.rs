//! Replay capture source
//!
//! Plays back a JSON-lines file where each line is one pre-extracted
//! [`PoseObservation`]. Lets the capture pipeline run end to end without a
//! physical camera or a pose model.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::device::{Camera, DeviceError, VideoFrame};
use super::extractor::LandmarkExtractor;
use crate::model::PoseObservation;

/// Camera that yields one recorded observation per frame
///
/// Once the recording is exhausted it keeps yielding empty frames.
pub struct ReplayCamera {
    path: PathBuf,
    lines: Mutex<VecDeque<String>>,
    open: AtomicBool,
    frames_read: AtomicU64,
}

impl ReplayCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: Mutex::new(VecDeque::new()),
            open: AtomicBool::new(false),
            frames_read: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Camera for ReplayCamera {
    async fn open(&self) -> Result<(), DeviceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DeviceError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

        let lines: VecDeque<String> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();

        info!("Replay camera loaded {} frames from {}", lines.len(), self.path.display());

        *self.lines.lock().await = lines;
        self.frames_read.store(0, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn read_frame(&self) -> Result<VideoFrame, DeviceError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected("replay camera not open".to_string()));
        }

        let line = self.lines.lock().await.pop_front();
        let index = self.frames_read.fetch_add(1, Ordering::SeqCst);

        Ok(VideoFrame {
            data: line.map(String::into_bytes).unwrap_or_default(),
            width: 0,
            height: 0,
            timestamp_ms: index,
        })
    }

    fn release(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Extractor that decodes the observation carried by a replay frame
#[derive(Debug, Default)]
pub struct ReplayExtractor;

#[async_trait::async_trait]
impl LandmarkExtractor for ReplayExtractor {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn extract(&self, frame: &VideoFrame) -> Result<Option<PoseObservation>> {
        if frame.data.is_empty() {
            return Ok(None);
        }

        match serde_json::from_slice::<PoseObservation>(&frame.data) {
            Ok(obs) => Ok(Some(obs)),
            Err(e) => {
                warn!("Skipping malformed replay frame {}: {}", frame.timestamp_ms, e);
                Err(e).context("Malformed replay frame")
            }
        }
    }

    fn name(&self) -> &str {
        "replay"
    }
}

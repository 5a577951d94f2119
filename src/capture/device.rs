use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// One captured camera image
#[derive(Debug, Clone, Default)]
pub struct VideoFrame {
    /// Encoded image bytes, format is a contract between camera and extractor
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Timestamp in milliseconds since the camera was opened
    pub timestamp_ms: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("device disconnected: {0}")]
    Disconnected(String),
}

/// Camera capture device
///
/// Implementations:
/// - Replay: JSON-lines file of pre-extracted observations
/// - Test fakes with acquire/release accounting
#[async_trait::async_trait]
pub trait Camera: Send + Sync {
    /// Acquire the device (permission prompt, open stream)
    async fn open(&self) -> Result<(), DeviceError>;

    /// Read the next available frame
    ///
    /// `DeviceError::Disconnected` means the device went away.
    async fn read_frame(&self) -> Result<VideoFrame, DeviceError>;

    /// Release the device. Called exactly once per successful `open`.
    fn release(&self);

    /// Get camera name for logging
    fn name(&self) -> &str;
}

/// Scoped camera acquisition, released on drop
pub struct CameraLease {
    camera: Arc<dyn Camera>,
}

impl CameraLease {
    pub async fn acquire(camera: Arc<dyn Camera>) -> Result<Self, DeviceError> {
        camera.open().await?;
        info!("Camera {} acquired", camera.name());
        Ok(Self { camera })
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.camera.release();
        info!("Camera {} released", self.camera.name());
    }
}

use anyhow::Result;

use super::device::VideoFrame;
use crate::model::PoseObservation;

/// Opaque per-image landmark producer (pose + hand keypoints)
#[async_trait::async_trait]
pub trait LandmarkExtractor: Send + Sync {
    /// Load the model. Called once, before the first extraction.
    async fn initialize(&self) -> Result<()>;

    /// Detect keypoints in one image
    ///
    /// `Ok(None)` means no observation for this image.
    async fn extract(&self, frame: &VideoFrame) -> Result<Option<PoseObservation>>;

    /// Get extractor name for logging
    fn name(&self) -> &str;
}

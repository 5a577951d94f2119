//! Camera capture and landmark extraction
//!
//! The pipeline owns the camera lease, runs one frame loop per capture
//! cycle and streams landmark frames to the bound room.

mod device;
mod extractor;
mod pipeline;
mod replay;
mod scheduler;

pub use device::{Camera, CameraLease, DeviceError, VideoFrame};
pub use extractor::LandmarkExtractor;
pub use pipeline::{CaptureNotice, CapturePipeline, CaptureState, CaptureStatus};
pub use replay::{ReplayCamera, ReplayExtractor};
pub use scheduler::{FrameScheduler, IntervalScheduler, ManualTicker, SchedulerFactory};

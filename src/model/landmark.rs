use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pose landmark indices kept per frame (shoulders, elbows, wrists)
pub const POSE_LANDMARK_INDICES: [usize; 6] = [11, 12, 13, 14, 15, 16];

/// Points tracked per hand
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Values per frame: (x, y) for every pose point plus both hands
pub const LANDMARK_FRAME_LEN: usize =
    POSE_LANDMARK_INDICES.len() * 2 + HAND_LANDMARK_COUNT * 2 * 2;

/// Normalized image coordinate of one detected keypoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Raw extractor output for one image
///
/// Any group may be missing (not detected), and individual points inside a
/// group may be missing too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseObservation {
    #[serde(default)]
    pub pose: Option<Vec<Option<Point>>>,
    #[serde(default)]
    pub left_hand: Option<Vec<Option<Point>>>,
    #[serde(default)]
    pub right_hand: Option<Vec<Option<Point>>>,
}

/// Fixed-length landmark vector streamed to the recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct LandmarkFrame(Vec<f32>);

impl LandmarkFrame {
    /// Wrap a raw vector, rejecting anything but the fixed length
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != LANDMARK_FRAME_LEN {
            return Err(Error::InvalidFrameLength {
                expected: LANDMARK_FRAME_LEN,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }

    /// Flatten an observation, zero-filling undetected groups and points
    pub fn from_observation(obs: &PoseObservation) -> Self {
        let mut values = Vec::with_capacity(LANDMARK_FRAME_LEN);
        push_coords(&mut values, obs.pose.as_deref(), POSE_LANDMARK_INDICES.iter().copied());
        push_coords(&mut values, obs.left_hand.as_deref(), 0..HAND_LANDMARK_COUNT);
        push_coords(&mut values, obs.right_hand.as_deref(), 0..HAND_LANDMARK_COUNT);
        debug_assert_eq!(values.len(), LANDMARK_FRAME_LEN);
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f32>> for LandmarkFrame {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<LandmarkFrame> for Vec<f32> {
    fn from(frame: LandmarkFrame) -> Self {
        frame.0
    }
}

fn push_coords(
    out: &mut Vec<f32>,
    group: Option<&[Option<Point>]>,
    indices: impl Iterator<Item = usize>,
) {
    for i in indices {
        match group.and_then(|points| points.get(i).copied().flatten()) {
            Some(p) => out.extend([p.x, p.y]),
            None => out.extend([0.0, 0.0]),
        }
    }
}

//! COCO-17 keypoint schema shared by the wire format and the pose processor.

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr, IntoStaticStr};

use crate::error::{Error, Result};

/// Number of keypoints per skeleton
pub const KEYPOINT_COUNT: usize = 17;

/// Left/right swap permutation: symmetric pairs exchanged, nose unchanged
pub const MIRROR_MAP: [usize; KEYPOINT_COUNT] =
    [0, 2, 1, 4, 3, 6, 5, 8, 7, 10, 9, 12, 11, 14, 13, 16, 15];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr, Display,
)]
#[repr(u8)]
pub enum BodyPart {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl BodyPart {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index).ok().and_then(Self::from_repr)
    }

    /// The same part on the other side of the body
    pub fn mirrored(self) -> Self {
        // MIRROR_MAP only holds valid indices
        Self::from_index(MIRROR_MAP[self.index()]).unwrap_or(self)
    }
}

/// Source index for output slot `index` when mirroring
pub fn mirrored_index(index: usize) -> usize {
    MIRROR_MAP.get(index).copied().unwrap_or(index)
}

/// One tracked point in normalized image space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Depth estimate; carried on the wire but unused
    pub z: f32,
    /// Visibility / confidence in [0, 1]
    pub v: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0, v: 1.0 }
    }
}

/// Exactly 17 landmarks for one player, one tick
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointFrame {
    landmarks: [Landmark; KEYPOINT_COUNT],
}

impl KeypointFrame {
    pub fn new(landmarks: [Landmark; KEYPOINT_COUNT]) -> Self {
        Self { landmarks }
    }

    /// Build from a decoded list. Extra entries past 17 are ignored.
    pub fn from_slice(landmarks: &[Landmark]) -> Result<Self> {
        if landmarks.len() < KEYPOINT_COUNT {
            return Err(Error::ShortFrame {
                len: landmarks.len(),
            });
        }
        let mut out = [Landmark::default(); KEYPOINT_COUNT];
        out.copy_from_slice(&landmarks[..KEYPOINT_COUNT]);
        Ok(Self { landmarks: out })
    }

    pub fn get(&self, part: BodyPart) -> &Landmark {
        &self.landmarks[part.index()]
    }

    pub fn landmarks(&self) -> &[Landmark; KEYPOINT_COUNT] {
        &self.landmarks
    }

    pub fn set(&mut self, part: BodyPart, landmark: Landmark) {
        self.landmarks[part.index()] = landmark;
    }
}

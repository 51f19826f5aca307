//! Keypoint-to-world mapping and per-tick smoothing.
//!
//! `receive` recomputes the raw target positions from a new frame.
//! `tick` runs every game-loop tick and eases the smoothed positions toward
//! those targets, so motion stays continuous between packets.

use glam::{Quat, Vec3};
use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::config::{ArenaConfig, PoseConfig};
use crate::skeleton::{BodyPart, KEYPOINT_COUNT, KeypointFrame, mirrored_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum PlayerSlot {
    #[strum(serialize = "P1")]
    Player1 = 0,
    #[strum(serialize = "P2")]
    Player2 = 1,
}

impl PlayerSlot {
    pub const BOTH: [PlayerSlot; 2] = [PlayerSlot::Player1, PlayerSlot::Player2];

    /// Map a sensor player id to a slot; anything but 0 and 1 is ignored
    pub fn from_wire_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::Player1),
            1 => Some(Self::Player2),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Player1 => Self::Player2,
            Self::Player2 => Self::Player1,
        }
    }

    /// World X direction that points toward the opponent
    pub fn forward_sign(self) -> f32 {
        match self {
            Self::Player1 => 1.0,
            Self::Player2 => -1.0,
        }
    }
}

/// Where the fighter stands and which way it faces
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Placement {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Spawn placement for a slot: player 1 faces +X, player 2 faces -X
    pub fn spawn(slot: PlayerSlot, arena: &ArenaConfig) -> Self {
        match slot {
            PlayerSlot::Player1 => Self::new(
                Vec3::new(arena.player1_spawn_x, arena.ground_y, 0.0),
                Quat::IDENTITY,
            ),
            PlayerSlot::Player2 => Self::new(
                Vec3::new(arena.player2_spawn_x, arena.ground_y, 0.0),
                Quat::from_rotation_y(std::f32::consts::PI),
            ),
        }
    }
}

pub struct PoseProcessor {
    slot: Option<PlayerSlot>,
    mirror: bool,
    mirror_on_assign: bool,
    scale: f32,
    offset: Vec3,
    smoothing: f32,
    min_x: f32,
    max_x: f32,
    ground_y: f32,
    placement: Placement,
    targets: [Vec3; KEYPOINT_COUNT],
    smoothed: [Vec3; KEYPOINT_COUNT],
    has_frame: bool,
}

impl PoseProcessor {
    pub fn new(pose: &PoseConfig, arena: &ArenaConfig, placement: Placement) -> Self {
        Self {
            slot: None,
            mirror: false,
            mirror_on_assign: pose.mirror_input,
            scale: pose.scale,
            offset: Vec3::from_array(pose.offset),
            smoothing: pose.smoothing_factor.clamp(0.0, 0.95),
            min_x: arena.min_x,
            max_x: arena.max_x,
            ground_y: arena.ground_y,
            placement,
            targets: [placement.position; KEYPOINT_COUNT],
            smoothed: [placement.position; KEYPOINT_COUNT],
            has_frame: false,
        }
    }

    /// Register this processor for a sensor player. Frames are ignored until then.
    pub fn assign(&mut self, slot: PlayerSlot) {
        debug!("Assigning pose processor to {}", slot);
        self.slot = Some(slot);
        self.mirror = self.mirror_on_assign;
    }

    pub fn slot(&self) -> Option<PlayerSlot> {
        self.slot
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.mirror = mirror;
    }

    /// Map a new frame into world-space targets.
    ///
    /// Returns `false` when the processor has no slot yet.
    pub fn receive(&mut self, frame: &KeypointFrame) -> bool {
        if self.slot.is_none() {
            return false;
        }

        let base = self.placement;
        let keypoints = frame.landmarks();
        for (i, target) in self.targets.iter_mut().enumerate() {
            let src = if self.mirror { mirrored_index(i) } else { i };
            let lm = &keypoints[src];
            // Image Y grows downward, world Y grows upward
            let local = Vec3::new(lm.x - 0.5, 0.5 - lm.y, 0.0);
            *target = base.position + base.rotation * ((local + self.offset) * self.scale);
        }
        self.has_frame = true;
        true
    }

    /// Advance one game-loop tick: keep the fighter inside the arena and ease
    /// the smoothed positions toward the targets.
    pub fn tick(&mut self) {
        let pos = &mut self.placement.position;
        pos.x = pos.x.clamp(self.min_x, self.max_x);
        pos.y = self.ground_y;
        pos.z = 0.0;

        let t = 1.0 - self.smoothing;
        for (smoothed, target) in self.smoothed.iter_mut().zip(self.targets.iter()) {
            *smoothed = smoothed.lerp(*target, t);
        }
    }

    /// Move the fighter along the world X axis
    pub fn translate_x(&mut self, dx: f32) {
        self.placement.position.x += dx;
    }

    /// Latest mapped position, or the fighter's origin before any frame
    pub fn target(&self, part: BodyPart) -> Vec3 {
        if self.has_frame {
            self.targets[part.index()]
        } else {
            self.placement.position
        }
    }

    /// Filtered position, or the fighter's origin before any frame
    pub fn smoothed(&self, part: BodyPart) -> Vec3 {
        if self.has_frame {
            self.smoothed[part.index()]
        } else {
            self.placement.position
        }
    }

    pub fn smoothed_positions(&self) -> &[Vec3; KEYPOINT_COUNT] {
        &self.smoothed
    }

    pub fn has_frame(&self) -> bool {
        self.has_frame
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Move the fighter back to `placement` and forget the current skeleton
    pub fn reset(&mut self, placement: Placement) {
        self.placement = placement;
        self.targets = [placement.position; KEYPOINT_COUNT];
        self.smoothed = [placement.position; KEYPOINT_COUNT];
        self.has_frame = false;
    }
}

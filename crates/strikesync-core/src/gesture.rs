//! Gesture detection on the raw target positions of one fighter.
//!
//! Three independent signals are derived each tick:
//!
//! - **Depth**: shoulder width against a baseline taken on the first
//!   evaluation. A wider stance means the player stepped toward the sensor,
//!   which moves the fighter toward the opponent.
//! - **Lean**: horizontal drift of the hip midpoint, applied only while the
//!   player holds a guard and neither hand is mid-punch.
//! - **Punch**: smoothed wrist speed per hand with a cooldown and a
//!   fire/reset hysteresis latch, so one swing produces one event.
//!
//! A fired punch opens a hitbox window on the [`HitTest`] collaborator for
//! `hitbox_active_secs`.

use glam::Vec3;
use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::config::GestureConfig;
use crate::hitbox::HitTest;
use crate::pose::PoseProcessor;
use crate::skeleton::BodyPart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Hand {
    Left = 0,
    Right = 1,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn wrist(self) -> BodyPart {
        match self {
            Self::Left => BodyPart::LeftWrist,
            Self::Right => BodyPart::RightWrist,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunchEvent {
    pub hand: Hand,
    /// Smoothed wrist speed when the punch fired
    pub velocity: f32,
    /// Game clock at the time of the punch
    pub time: f64,
}

/// What one evaluation produced. Movement has already been applied to the pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureOutput {
    pub depth_dx: f32,
    pub lean_dx: f32,
    pub punches: Vec<PunchEvent>,
}

#[derive(Debug, Clone, Default)]
struct HandState {
    last_pos: Option<Vec3>,
    velocity: f32,
    last_punch: Option<f64>,
    /// Hysteresis latch: set on fire, cleared below the reset threshold
    fast: bool,
    hitbox_deadline: Option<f64>,
}

pub struct GestureDetector {
    config: GestureConfig,
    baseline_shoulder_width: Option<f32>,
    last_hip_center_x: Option<f32>,
    last_punch_eval: Option<f64>,
    hands: [HandState; 2],
}

impl GestureDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            baseline_shoulder_width: None,
            last_hip_center_x: None,
            last_punch_eval: None,
            hands: Default::default(),
        }
    }

    /// Forget calibration and motion history (match start or rematch)
    pub fn reset(&mut self) {
        self.baseline_shoulder_width = None;
        self.last_hip_center_x = None;
        self.last_punch_eval = None;
        self.hands = Default::default();
    }

    /// Run all three detectors for one tick.
    ///
    /// `now` is the game clock and `dt` the tick length, both in seconds.
    /// A knocked-out fighter does not move, and its punches are tracked but
    /// swallowed without an event.
    pub fn evaluate(
        &mut self,
        now: f64,
        dt: f32,
        pose: &mut PoseProcessor,
        knocked_out: bool,
        hit_test: &mut dyn HitTest,
    ) -> GestureOutput {
        self.expire_hitboxes(now, hit_test);

        let mut output = GestureOutput::default();
        if !pose.has_frame() {
            return output;
        }

        if knocked_out {
            // Keep the hip history current so recovery starts from a fresh delta
            self.last_hip_center_x = Some(hip_center_x(pose));
        } else {
            output.depth_dx = self.detect_depth(dt, pose);
            output.lean_dx = self.detect_lean(dt, pose);
        }
        for punch in self.detect_punches(now, pose) {
            if knocked_out {
                debug!("{} punch suppressed while knocked out", punch.hand);
                continue;
            }
            self.open_hitbox(punch.hand, now, hit_test);
            output.punches.push(punch);
        }
        output
    }

    /// Close hitbox windows whose time is up, unless a hit already closed them
    pub fn expire_hitboxes(&mut self, now: f64, hit_test: &mut dyn HitTest) {
        for hand in Hand::BOTH {
            let state = &mut self.hands[hand.index()];
            if let Some(deadline) = state.hitbox_deadline
                && now >= deadline
            {
                state.hitbox_deadline = None;
                if hit_test.is_active(hand) {
                    hit_test.deactivate(hand);
                }
            }
        }
    }

    fn open_hitbox(&mut self, hand: Hand, now: f64, hit_test: &mut dyn HitTest) {
        hit_test.activate(hand);
        self.hands[hand.index()].hitbox_deadline = Some(now + self.config.hitbox_active_secs);
    }

    fn detect_depth(&mut self, dt: f32, pose: &mut PoseProcessor) -> f32 {
        let Some(slot) = pose.slot() else {
            return 0.0;
        };

        let left = pose.target(BodyPart::LeftShoulder);
        let right = pose.target(BodyPart::RightShoulder);
        // Horizontal-plane distance so the facing rotation does not matter
        let width = Vec3::new(left.x - right.x, 0.0, left.z - right.z).length();

        let Some(baseline) = self.baseline_shoulder_width else {
            if width > f32::EPSILON {
                debug!("{} shoulder width calibrated: {:.3}", slot, width);
                self.baseline_shoulder_width = Some(width);
            }
            return 0.0;
        };

        let ratio = width / baseline;
        let threshold = self.config.depth_threshold;
        let toward = if ratio > 1.0 + threshold {
            1.0
        } else if ratio < 1.0 - threshold {
            -1.0
        } else {
            return 0.0;
        };

        let dx = toward * slot.forward_sign() * self.config.depth_speed * dt;
        pose.translate_x(dx);
        dx
    }

    fn detect_lean(&mut self, dt: f32, pose: &mut PoseProcessor) -> f32 {
        let center = hip_center_x(pose);
        let Some(last) = self.last_hip_center_x.replace(center) else {
            return 0.0;
        };

        let delta = center - last;
        let guarding = pose.target(BodyPart::LeftWrist).y > pose.target(BodyPart::LeftHip).y;
        let punching = self.hands.iter().any(|h| h.fast);

        if !guarding || punching || delta.abs() <= self.config.lean_threshold {
            return 0.0;
        }

        let max_lean = self.config.max_lean;
        let normalized = delta.clamp(-max_lean, max_lean) / max_lean;
        let dx = normalized * self.config.lean_speed * dt;
        pose.translate_x(dx);
        dx
    }

    fn detect_punches(&mut self, now: f64, pose: &PoseProcessor) -> Vec<PunchEvent> {
        let Some(last_eval) = self.last_punch_eval else {
            // First evaluation only records where the wrists are
            for hand in Hand::BOTH {
                self.hands[hand.index()].last_pos = Some(pose.target(hand.wrist()));
            }
            self.last_punch_eval = Some(now);
            return Vec::new();
        };

        let elapsed = now - last_eval;
        if elapsed <= self.config.min_tick_secs {
            return Vec::new();
        }

        let cfg = &self.config;
        let mut fired = Vec::new();

        for hand in Hand::BOTH {
            let state = &mut self.hands[hand.index()];
            let current = pose.target(hand.wrist());
            let instant = match state.last_pos {
                Some(last) => (current - last).length() / elapsed as f32,
                None => 0.0,
            };
            let smoothed = state.velocity + (instant - state.velocity) * cfg.velocity_smoothing;

            let cooled_down = state
                .last_punch
                .is_none_or(|t| now - t > cfg.punch_cooldown_secs);

            if smoothed > cfg.punch_velocity_threshold && cooled_down {
                if !state.fast {
                    debug!("{} punch at {:.2} m/s", hand, smoothed);
                    fired.push(PunchEvent {
                        hand,
                        velocity: smoothed,
                        time: now,
                    });
                    state.last_punch = Some(now);
                    state.fast = true;
                }
            } else if smoothed < cfg.punch_velocity_reset_threshold {
                state.fast = false;
            }

            state.last_pos = Some(current);
            state.velocity = smoothed;
        }

        self.last_punch_eval = Some(now);
        fired
    }

    /// Current smoothed wrist speed, used to scale hit damage
    pub fn hand_velocity(&self, hand: Hand) -> f32 {
        self.hands[hand.index()].velocity
    }

    pub fn is_hand_fast(&self, hand: Hand) -> bool {
        self.hands[hand.index()].fast
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline_shoulder_width.is_some()
    }

    pub fn baseline_shoulder_width(&self) -> Option<f32> {
        self.baseline_shoulder_width
    }
}

fn hip_center_x(pose: &PoseProcessor) -> f32 {
    (pose.target(BodyPart::LeftHip).x + pose.target(BodyPart::RightHip).x) / 2.0
}

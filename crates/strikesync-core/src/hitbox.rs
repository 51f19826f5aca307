//! Hand hitboxes.
//!
//! A hitbox is armed by the gesture detector when a punch fires and closes
//! either when its window runs out or when it lands. While armed, the wrist is
//! tested against the opponent's torso, modelled as the segment from the
//! shoulder midpoint to the hip midpoint.

use glam::Vec3;
use tracing::debug;

use crate::config::HitboxConfig;
use crate::gesture::{GestureDetector, Hand};
use crate::pose::PoseProcessor;
use crate::skeleton::BodyPart;

/// Hitbox switchboard driven by the gesture detector.
pub trait HitTest {
    fn activate(&mut self, hand: Hand);
    fn deactivate(&mut self, hand: Hand);
    fn is_active(&self, hand: Hand) -> bool;
}

/// A landed punch, before the defender's combat rules are applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitReport {
    pub hand: Hand,
    /// Wrist speed scaled by the damage multiplier
    pub velocity: f32,
    pub contact: Vec3,
}

#[derive(Debug, Clone)]
pub struct HandHitboxes {
    config: HitboxConfig,
    active: [bool; 2],
}

impl HandHitboxes {
    pub fn new(config: HitboxConfig) -> Self {
        Self {
            config,
            active: [false; 2],
        }
    }

    /// Test every armed hand of `attacker` against `defender`.
    ///
    /// A hand only lands when it is fast enough, so walking into an open
    /// hand does nothing. A landed hand is disarmed until the next punch.
    pub fn probe(
        &mut self,
        attacker: &PoseProcessor,
        gesture: &GestureDetector,
        defender: &PoseProcessor,
    ) -> Vec<HitReport> {
        let mut reports = Vec::new();
        if !attacker.has_frame() || !defender.has_frame() {
            return reports;
        }

        let (top, bottom) = torso(defender);

        for hand in Hand::BOTH {
            if !self.is_active(hand) {
                continue;
            }
            let wrist = attacker.target(hand.wrist());
            if distance_to_segment(wrist, top, bottom) > self.config.reach {
                continue;
            }
            let velocity = gesture.hand_velocity(hand);
            if velocity <= self.config.min_hit_velocity {
                continue;
            }

            debug!("{} hand landed at {:.2} m/s", hand, velocity);
            self.deactivate(hand);
            reports.push(HitReport {
                hand,
                velocity: velocity * self.config.damage_multiplier,
                contact: wrist,
            });
        }

        reports
    }

    pub fn reset(&mut self) {
        self.active = [false; 2];
    }
}

impl HitTest for HandHitboxes {
    fn activate(&mut self, hand: Hand) {
        self.active[hand.index()] = true;
    }

    fn deactivate(&mut self, hand: Hand) {
        self.active[hand.index()] = false;
    }

    fn is_active(&self, hand: Hand) -> bool {
        self.active[hand.index()]
    }
}

fn torso(pose: &PoseProcessor) -> (Vec3, Vec3) {
    let shoulders =
        (pose.target(BodyPart::LeftShoulder) + pose.target(BodyPart::RightShoulder)) * 0.5;
    let hips = (pose.target(BodyPart::LeftHip) + pose.target(BodyPart::RightHip)) * 0.5;
    (shoulders, hips)
}

fn distance_to_segment(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

//! Tuning values for the whole pipeline.
//!
//! Every section has `#[serde(default)]`, so a config file only needs the
//! keys it wants to override:
//!
//! ```toml
//! [gesture]
//! punch_velocity_threshold = 1.5
//!
//! [combat]
//! regen_enabled = false
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default UDP port the pose server sends to
pub const DEFAULT_PORT: u16 = 9001;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub pose: PoseConfig,
    pub arena: ArenaConfig,
    pub gesture: GestureConfig,
    pub hitbox: HitboxConfig,
    pub combat: CombatConfig,
    pub bout: BoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub port: u16,
    /// Upper bound on how long a blocked receive waits before re-checking the stop flag
    pub poll_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub scale: f32,
    pub offset: [f32; 3],
    /// 0 snaps to the target every tick; must stay below 0.95
    pub smoothing_factor: f32,
    /// Swap left/right body parts so the avatar mirrors the player
    pub mirror_input: bool,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: [0.0; 3],
            smoothing_factor: 0.6,
            mirror_input: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub min_x: f32,
    pub max_x: f32,
    pub ground_y: f32,
    pub player1_spawn_x: f32,
    pub player2_spawn_x: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_x: -8.0,
            max_x: 8.0,
            ground_y: 0.0,
            player1_spawn_x: -2.0,
            player2_spawn_x: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub depth_threshold: f32,
    pub depth_speed: f32,
    pub lean_threshold: f32,
    pub lean_speed: f32,
    pub max_lean: f32,
    pub velocity_smoothing: f32,
    pub punch_velocity_threshold: f32,
    pub punch_velocity_reset_threshold: f32,
    pub punch_cooldown_secs: f64,
    pub hitbox_active_secs: f64,
    /// Punch evaluation is skipped when less time than this has passed
    pub min_tick_secs: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            depth_threshold: 0.15,
            depth_speed: 2.0,
            lean_threshold: 0.08,
            lean_speed: 2.0,
            max_lean: 0.25,
            velocity_smoothing: 0.2,
            punch_velocity_threshold: 1.2,
            punch_velocity_reset_threshold: 0.5,
            punch_cooldown_secs: 0.6,
            hitbox_active_secs: 0.3,
            min_tick_secs: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitboxConfig {
    /// Contacts slower than this are ignored (walking into a raised fist)
    pub min_hit_velocity: f32,
    pub damage_multiplier: f32,
    /// Distance from the defender's torso line that counts as contact
    pub reach: f32,
}

impl Default for HitboxConfig {
    fn default() -> Self {
        Self {
            min_hit_velocity: 1.2,
            damage_multiplier: 1.0,
            reach: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub max_health: f32,
    pub regen_enabled: bool,
    pub regen_rate: f32,
    pub regen_delay_secs: f64,
    pub punch_damage: f32,
    pub strong_punch_damage: f32,
    pub strong_hit_velocity: f32,
    pub stun_secs: f64,
    pub knockout_recovery_secs: f64,
    pub recovery_health_fraction: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            regen_enabled: true,
            regen_rate: 5.0,
            regen_delay_secs: 5.0,
            punch_damage: 10.0,
            strong_punch_damage: 20.0,
            strong_hit_velocity: 3.0,
            stun_secs: 0.3,
            knockout_recovery_secs: 5.0,
            recovery_health_fraction: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoutConfig {
    pub countdown_secs: f64,
    pub tick_hz: u32,
}

impl Default for BoutConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3.0,
            tick_hz: 60,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the filters cannot work with
    pub fn validate(&self) -> Result<()> {
        let smoothing = self.pose.smoothing_factor;
        if !(0.0..0.95).contains(&smoothing) {
            return Err(Error::InvalidConfig(format!(
                "pose.smoothing_factor must be in [0, 0.95), got {}",
                smoothing
            )));
        }
        if self.arena.min_x >= self.arena.max_x {
            return Err(Error::InvalidConfig(format!(
                "arena.min_x ({}) must be below arena.max_x ({})",
                self.arena.min_x, self.arena.max_x
            )));
        }
        let g = &self.gesture;
        if g.punch_velocity_reset_threshold >= g.punch_velocity_threshold {
            return Err(Error::InvalidConfig(format!(
                "gesture.punch_velocity_reset_threshold ({}) must be below punch_velocity_threshold ({})",
                g.punch_velocity_reset_threshold, g.punch_velocity_threshold
            )));
        }
        if g.max_lean <= 0.0 {
            return Err(Error::InvalidConfig("gesture.max_lean must be positive".into()));
        }
        if self.combat.max_health <= 0.0 {
            return Err(Error::InvalidConfig("combat.max_health must be positive".into()));
        }
        if self.bout.tick_hz == 0 {
            return Err(Error::InvalidConfig("bout.tick_hz must be non-zero".into()));
        }
        Ok(())
    }
}

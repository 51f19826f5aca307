//! Per-fighter combat state machine.
//!
//! ```text
//! Active ──hit──▶ Stunned ──stun_secs──▶ Active
//!   │                │
//!   └──health 0──────┴──▶ KnockedOut ──knockout_recovery_secs──▶ Active (30% health)
//! ```
//!
//! Timed states carry their deadline on the game clock; [`CombatResolver::tick`]
//! moves a fighter on once the deadline has passed. Transitions are reported
//! as [`CombatEvent`]s, drained by the match layer.

use strum::{Display, IntoStaticStr};
use tracing::{debug, info};

use crate::config::CombatConfig;
use crate::hitbox::HitReport;
use crate::pose::PlayerSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum FighterState {
    Active,
    Stunned,
    KnockedOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Status {
    Active,
    Stunned { until: f64 },
    KnockedOut { until: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEvent {
    DamageTaken {
        fighter: PlayerSlot,
        amount: f32,
        health: f32,
        strong: bool,
    },
    Stunned {
        fighter: PlayerSlot,
    },
    StunEnded {
        fighter: PlayerSlot,
    },
    KnockedOut {
        fighter: PlayerSlot,
    },
    Recovered {
        fighter: PlayerSlot,
        health: f32,
    },
    Regenerated {
        fighter: PlayerSlot,
        health: f32,
    },
}

/// Damage for a hit at `velocity`, and whether it counted as strong.
///
/// Normal hits scale the base damage by `velocity / 2` clamped to
/// `[0.5, 2.0]`; hits faster than the strong cutoff deal the flat strong
/// damage instead.
pub fn punch_damage(config: &CombatConfig, velocity: f32) -> (f32, bool) {
    if velocity > config.strong_hit_velocity {
        (config.strong_punch_damage, true)
    } else {
        let multiplier = (velocity / 2.0).clamp(0.5, 2.0);
        (config.punch_damage * multiplier, false)
    }
}

#[derive(Debug, Clone)]
pub struct FighterCombat {
    slot: PlayerSlot,
    health: f32,
    status: Status,
    last_hit: Option<f64>,
    regen_timer: f64,
}

impl FighterCombat {
    fn new(slot: PlayerSlot, config: &CombatConfig) -> Self {
        Self {
            slot,
            health: config.max_health,
            status: Status::Active,
            last_hit: None,
            regen_timer: 0.0,
        }
    }

    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn state(&self) -> FighterState {
        match self.status {
            Status::Active => FighterState::Active,
            Status::Stunned { .. } => FighterState::Stunned,
            Status::KnockedOut { .. } => FighterState::KnockedOut,
        }
    }

    pub fn is_knocked_out(&self) -> bool {
        matches!(self.status, Status::KnockedOut { .. })
    }

    pub fn is_stunned(&self) -> bool {
        matches!(self.status, Status::Stunned { .. })
    }

    pub fn last_hit(&self) -> Option<f64> {
        self.last_hit
    }
}

pub struct CombatResolver {
    config: CombatConfig,
    fighters: [FighterCombat; 2],
    events: Vec<CombatEvent>,
}

impl CombatResolver {
    pub fn new(config: CombatConfig) -> Self {
        let fighters = PlayerSlot::BOTH.map(|slot| FighterCombat::new(slot, &config));
        Self {
            config,
            fighters,
            events: Vec::new(),
        }
    }

    /// Full health, no timers, no pending events
    pub fn reset(&mut self) {
        self.fighters = PlayerSlot::BOTH.map(|slot| FighterCombat::new(slot, &self.config));
        self.events.clear();
    }

    /// Apply a landed punch to `defender`. Returns the damage dealt, or
    /// `None` when the defender is knocked out and the hit is ignored.
    pub fn resolve_hit(&mut self, defender: PlayerSlot, now: f64, report: &HitReport) -> Option<f32> {
        let (amount, strong) = punch_damage(&self.config, report.velocity);
        let stun_secs = self.config.stun_secs;
        let recovery_secs = self.config.knockout_recovery_secs;
        let fighter = &mut self.fighters[defender.index()];

        if fighter.is_knocked_out() {
            debug!("{} is knocked out, ignoring hit", defender);
            return None;
        }

        fighter.health = (fighter.health - amount).max(0.0);
        fighter.last_hit = Some(now);
        self.events.push(CombatEvent::DamageTaken {
            fighter: defender,
            amount,
            health: fighter.health,
            strong,
        });

        if fighter.health <= 0.0 {
            fighter.health = 0.0;
            fighter.status = Status::KnockedOut {
                until: now + recovery_secs,
            };
            info!("{} knocked out", defender);
            self.events.push(CombatEvent::KnockedOut { fighter: defender });
        } else {
            // A hit while stunned restarts the stun rather than stacking it
            let was_stunned = fighter.is_stunned();
            fighter.status = Status::Stunned {
                until: now + stun_secs,
            };
            if !was_stunned {
                self.events.push(CombatEvent::Stunned { fighter: defender });
            }
        }

        Some(amount)
    }

    /// Expire stun and knockout deadlines and run once-per-second regeneration
    pub fn tick(&mut self, now: f64, dt: f64) {
        let config = &self.config;
        for fighter in &mut self.fighters {
            match fighter.status {
                Status::Stunned { until } if now >= until => {
                    fighter.status = Status::Active;
                    self.events.push(CombatEvent::StunEnded {
                        fighter: fighter.slot,
                    });
                }
                Status::KnockedOut { until } if now >= until => {
                    fighter.status = Status::Active;
                    fighter.health = config.max_health * config.recovery_health_fraction;
                    info!("{} recovered with {:.0} health", fighter.slot, fighter.health);
                    self.events.push(CombatEvent::Recovered {
                        fighter: fighter.slot,
                        health: fighter.health,
                    });
                }
                _ => {}
            }

            fighter.regen_timer += dt;
            while fighter.regen_timer >= 1.0 {
                fighter.regen_timer -= 1.0;
                if regen_allowed(config, fighter, now) {
                    fighter.health = (fighter.health + config.regen_rate).min(config.max_health);
                    self.events.push(CombatEvent::Regenerated {
                        fighter: fighter.slot,
                        health: fighter.health,
                    });
                }
            }
        }
    }

    pub fn fighter(&self, slot: PlayerSlot) -> &FighterCombat {
        &self.fighters[slot.index()]
    }

    pub fn health(&self, slot: PlayerSlot) -> f32 {
        self.fighter(slot).health
    }

    pub fn health_fraction(&self, slot: PlayerSlot) -> f32 {
        self.fighter(slot).health / self.config.max_health
    }

    pub fn state(&self, slot: PlayerSlot) -> FighterState {
        self.fighter(slot).state()
    }

    pub fn is_knocked_out(&self, slot: PlayerSlot) -> bool {
        self.fighter(slot).is_knocked_out()
    }

    /// Take every transition recorded since the last call, oldest first
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }
}

fn regen_allowed(config: &CombatConfig, fighter: &FighterCombat, now: f64) -> bool {
    config.regen_enabled
        && fighter.status == Status::Active
        && fighter.health < config.max_health
        && fighter
            .last_hit
            .is_none_or(|t| now - t > config.regen_delay_secs)
}

//! # strikesync-core
//!
//! Motion-ingestion and combat core for a two-player pose-controlled
//! fighting game.
//!
//! This crate provides:
//! - A UDP ingestion channel that decouples socket I/O from the game loop
//! - Packet dispatch and per-player pose processing (mapping, mirroring, smoothing)
//! - Gesture detection: depth steps, guarded leans and punches
//! - Hitbox probing and the per-fighter combat state machine
//! - A `Bout` that runs one match from countdown to knockout

pub mod bout;
pub mod combat;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gesture;
pub mod hitbox;
pub mod ingest;
pub mod pose;
pub mod skeleton;

pub use bout::{Bout, BoutEvent, Fighter, Phase};
pub use combat::{CombatEvent, CombatResolver, FighterCombat, FighterState, punch_damage};
pub use config::{
    ArenaConfig, BoutConfig, CombatConfig, Config, DEFAULT_PORT, GestureConfig, HitboxConfig,
    IngestConfig, PoseConfig,
};
pub use dispatch::{FrameDispatcher, PacketRate, PlayerEntry, PosePacket};
pub use error::{Error, Result};
pub use gesture::{GestureDetector, GestureOutput, Hand, PunchEvent};
pub use hitbox::{HandHitboxes, HitReport, HitTest};
pub use ingest::{IngestionChannel, MessageSource, ScriptedSource};
pub use pose::{Placement, PlayerSlot, PoseProcessor};
pub use skeleton::{BodyPart, KEYPOINT_COUNT, KeypointFrame, Landmark, MIRROR_MAP, mirrored_index};

//! CLI command implementations.

pub mod config;
pub mod replay;
pub mod run;

use std::path::Path;

use owo_colors::OwoColorize;
use strikesync_core::{BoutEvent, Config};
use tracing::{info, warn};

use crate::session::EventRow;

/// Load `path`, falling back to defaults when it is missing or invalid
pub fn load_config(path: &Path) -> Config {
    match Config::load(path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            config
        }
        Err(e) if e.is_not_found() => {
            info!("No config at {:?}, using defaults", path);
            Config::default()
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    }
}

/// Print one event line to stdout
pub fn print_event(clock: f64, event: &BoutEvent) {
    let row = EventRow::from_event(event);
    let fighter = row.fighter.map(<&'static str>::from).unwrap_or("--");
    let stamp = format!("[{:>8.3}]", clock);

    let line = match event {
        BoutEvent::CountdownTick(n) => format!("{}", n.bold()),
        BoutEvent::Fight => format!("{}", "FIGHT!".bold().yellow()),
        BoutEvent::Punch { .. } => format!("{} {} {}", fighter.cyan(), row.kind, row.detail),
        BoutEvent::Hit { .. } => {
            format!("{} {} {}", fighter.cyan(), row.kind.red().bold(), row.detail)
        }
        BoutEvent::Combat(_) => format!("{} {} {}", fighter.cyan(), row.kind.magenta(), row.detail),
        BoutEvent::MatchOver { .. } => format!("{} {}", fighter.bold().green(), "WINS!".bold().green()),
    };

    println!("{} {}", stamp.dimmed(), line);
}

//! Per-run event log.
//!
//! Every bout event is appended as one TSV row to
//! `<base>/<YYYY-MM-DD>/session_<HHMMSS>.tsv`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use strikesync_core::{BoutEvent, CombatEvent, PlayerSlot};

pub const HEADER: &str = "clock\tevent\tfighter\tdetail";

/// Flat description of a [`BoutEvent`], shared by the log and the console
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub kind: &'static str,
    pub fighter: Option<PlayerSlot>,
    pub detail: String,
}

impl EventRow {
    pub fn from_event(event: &BoutEvent) -> Self {
        let (kind, fighter, detail) = match event {
            BoutEvent::CountdownTick(n) => ("countdown", None, n.to_string()),
            BoutEvent::Fight => ("fight", None, String::new()),
            BoutEvent::Punch { fighter, event } => (
                "punch",
                Some(*fighter),
                format!("{} hand {:.2} m/s", event.hand, event.velocity),
            ),
            BoutEvent::Hit {
                attacker,
                report,
                damage,
            } => (
                "hit",
                Some(*attacker),
                format!("{} hand for {:.1} damage", report.hand, damage),
            ),
            BoutEvent::Combat(combat) => combat_row(combat),
            BoutEvent::MatchOver { winner } => ("winner", Some(*winner), String::new()),
        };
        Self {
            kind,
            fighter,
            detail,
        }
    }

    pub fn to_tsv(&self, clock: f64) -> String {
        let fighter = self.fighter.map(<&'static str>::from).unwrap_or("-");
        format!("{:.3}\t{}\t{}\t{}", clock, self.kind, fighter, self.detail)
    }
}

fn combat_row(event: &CombatEvent) -> (&'static str, Option<PlayerSlot>, String) {
    match *event {
        CombatEvent::DamageTaken {
            fighter,
            amount,
            health,
            strong,
        } => {
            let tier = if strong { "strong " } else { "" };
            (
                "damage",
                Some(fighter),
                format!("{}{:.1}, health {:.1}", tier, amount, health),
            )
        }
        CombatEvent::Stunned { fighter } => ("stunned", Some(fighter), String::new()),
        CombatEvent::StunEnded { fighter } => ("stun_ended", Some(fighter), String::new()),
        CombatEvent::KnockedOut { fighter } => ("knockout", Some(fighter), String::new()),
        CombatEvent::Recovered { fighter, health } => {
            ("recovered", Some(fighter), format!("health {:.1}", health))
        }
        CombatEvent::Regenerated { fighter, health } => {
            ("regen", Some(fighter), format!("health {:.1}", health))
        }
    }
}

pub struct SessionLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SessionLog {
    /// Create a new dated log file under `base_dir` and write the header
    pub fn start<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let now: DateTime<Local> = Local::now();
        let day_dir = base_dir.as_ref().join(now.format("%Y-%m-%d").to_string());
        fs::create_dir_all(&day_dir)
            .with_context(|| format!("Failed to create session directory {:?}", day_dir))?;

        let path = day_dir.join(format!("session_{}.tsv", now.format("%H%M%S")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open session log {:?}", path))?;

        let mut log = Self {
            path,
            writer: BufWriter::new(file),
        };
        writeln!(log.writer, "{}", HEADER)?;
        Ok(log)
    }

    pub fn record(&mut self, clock: f64, event: &BoutEvent) -> Result<()> {
        writeln!(self.writer, "{}", EventRow::from_event(event).to_tsv(clock))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_start_creates_dated_file_with_header() {
        let dir = tempdir().unwrap();
        let mut log = SessionLog::start(dir.path()).unwrap();
        log.flush().unwrap();

        let path = log.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("session_") && name.ends_with(".tsv"));

        let day = path.parent().unwrap().file_name().unwrap().to_string_lossy();
        assert_eq!(day.len(), "YYYY-MM-DD".len());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}\n", HEADER));
    }

    #[test]
    fn test_record_appends_rows() {
        let dir = tempdir().unwrap();
        let mut log = SessionLog::start(dir.path()).unwrap();
        log.record(1.5, &BoutEvent::Fight).unwrap();
        log.record(
            2.25,
            &BoutEvent::MatchOver {
                winner: PlayerSlot::Player2,
            },
        )
        .unwrap();
        log.flush().unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1.500\tfight\t-\t");
        assert_eq!(lines[2], "2.250\twinner\tP2\t");
    }

    #[test]
    fn test_damage_row() {
        let row = EventRow::from_event(&BoutEvent::Combat(CombatEvent::DamageTaken {
            fighter: PlayerSlot::Player1,
            amount: 20.0,
            health: 60.0,
            strong: true,
        }));
        assert_eq!(row.kind, "damage");
        assert_eq!(row.fighter, Some(PlayerSlot::Player1));
        assert_eq!(row.detail, "strong 20.0, health 60.0");
        assert_eq!(row.to_tsv(0.0), "0.000\tdamage\tP1\tstrong 20.0, health 60.0");
    }
}

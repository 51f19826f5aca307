//! Offline replay of a recorded packet stream.
//!
//! Each non-empty line of the capture is one pose packet, fed to the bout on
//! its own tick. The bout starts directly in the fighting phase so every
//! gesture is evaluated.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use strikesync_core::{Bout, BoutEvent, Config, PlayerSlot, ScriptedSource};
use tracing::{debug, info};

use super::{load_config, print_event};

#[derive(Debug, Default, PartialEq)]
pub struct ReplaySummary {
    pub packets: usize,
    pub punches: [usize; 2],
    pub hits: [usize; 2],
    pub winner: Option<PlayerSlot>,
}

impl ReplaySummary {
    fn record(&mut self, event: &BoutEvent) {
        match event {
            BoutEvent::Punch { fighter, .. } => self.punches[fighter.index()] += 1,
            BoutEvent::Hit { attacker, .. } => self.hits[attacker.index()] += 1,
            BoutEvent::MatchOver { winner } => self.winner = Some(*winner),
            _ => {}
        }
    }
}

pub fn run(file: &Path, config_path: Option<&Path>, tick_hz: Option<u32>) -> Result<()> {
    let config = config_path.map(load_config).unwrap_or_default();
    let hz = tick_hz.unwrap_or(config.bout.tick_hz).max(1);

    let capture = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read capture {:?}", file))?;
    info!("Replaying {:?} at {} Hz", file, hz);

    let summary = replay(config, capture.lines(), 1.0 / hz as f64, print_event);

    println!();
    println!("{}", "Replay summary".bold());
    println!("  packets: {}", summary.packets);
    for slot in PlayerSlot::BOTH {
        println!(
            "  {}: {} punches, {} hits",
            slot,
            summary.punches[slot.index()],
            summary.hits[slot.index()]
        );
    }
    match summary.winner {
        Some(winner) => println!("  winner: {}", winner.green()),
        None => println!("  winner: {}", "none".dimmed()),
    }

    Ok(())
}

/// Run `lines` through a fresh bout, one per tick of `dt` seconds, calling
/// `on_event` for every event. Stops early once the match has a winner.
pub fn replay<'a, I, F>(config: Config, lines: I, dt: f64, mut on_event: F) -> ReplaySummary
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(f64, &BoutEvent),
{
    let mut bout = Bout::new(config);
    let source = ScriptedSource::new();
    let mut summary = ReplaySummary::default();

    let fight = bout.start_fight();
    on_event(bout.clock(), &fight);

    for line in lines.into_iter().map(str::trim).filter(|l| !l.is_empty()) {
        source.push(line);
        summary.packets += 1;

        for event in bout.tick(dt, &source) {
            summary.record(&event);
            on_event(bout.clock(), &event);
        }

        if bout.winner().is_some() {
            debug!("Match decided, stopping replay");
            break;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use strikesync_core::{BodyPart, KEYPOINT_COUNT, Landmark, PlayerEntry, PosePacket};
    use tempfile::tempdir;

    fn frame(left_wrist_x: f32) -> String {
        let mut landmarks = vec![Landmark::new(0.5, 0.5); KEYPOINT_COUNT];
        landmarks[BodyPart::LeftShoulder.index()] = Landmark::new(0.4, 0.3);
        landmarks[BodyPart::RightShoulder.index()] = Landmark::new(0.6, 0.3);
        landmarks[BodyPart::LeftWrist.index()] = Landmark::new(left_wrist_x, 0.35);
        landmarks[BodyPart::RightWrist.index()] = Landmark::new(0.55, 0.35);
        landmarks[BodyPart::LeftHip.index()] = Landmark::new(0.45, 0.7);
        landmarks[BodyPart::RightHip.index()] = Landmark::new(0.55, 0.7);
        let packet = PosePacket {
            players: vec![PlayerEntry { id: 0, landmarks }],
        };
        serde_json::to_string(&packet).unwrap()
    }

    fn unmirrored() -> Config {
        let mut config = Config::default();
        config.pose.mirror_input = false;
        config
    }

    #[test]
    fn test_replay_counts_one_punch() {
        let capture = [frame(0.45), frame(0.85), frame(0.45)].join("\n");
        let mut seen = Vec::new();

        let summary = replay(unmirrored(), capture.lines(), 0.05, |_, e| seen.push(e.clone()));

        assert_eq!(summary.packets, 3);
        assert_eq!(summary.punches, [1, 0]);
        assert_eq!(summary.hits, [0, 0]);
        assert_eq!(summary.winner, None);
        assert_eq!(seen.first(), Some(&BoutEvent::Fight));
    }

    #[test]
    fn test_replay_skips_blank_and_bad_lines() {
        let capture = format!("\n{}\n   \nnot json\n{}\n", frame(0.45), frame(0.85));
        let summary = replay(unmirrored(), capture.lines(), 0.05, |_, _| {});

        // The bad line is still a tick; it just carries no frame
        assert_eq!(summary.packets, 3);
        assert_eq!(summary.punches, [1, 0]);
    }

    #[test]
    fn test_run_reads_capture_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.jsonl");
        std::fs::write(&path, [frame(0.45), frame(0.85)].join("\n")).unwrap();

        assert!(run(&path, None, Some(20)).is_ok());
        assert!(run(&dir.path().join("missing.jsonl"), None, None).is_err());
    }
}

//! Live mode: UDP ingestion plus the fixed-rate game loop.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use strikesync_core::{Bout, BoutEvent, IngestionChannel};
use tracing::{debug, error, info, warn};

use super::{load_config, print_event};
use crate::cli::RunArgs;
use crate::input::{self, KeyCommand};
use crate::session::SessionLog;
use crate::shutdown::{self, ShutdownSignal};

/// Longest tick fed to the bout after a stall (debugger, suspended terminal)
const MAX_TICK: Duration = Duration::from_millis(250);

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = load_config(&args.config);
    if let Some(port) = args.port {
        config.ingest.port = port;
    }
    config.validate()?;

    let shutdown = Arc::new(ShutdownSignal::new());
    shutdown::install_ctrlc(&shutdown)?;

    let (key_tx, key_rx) = mpsc::channel();
    let _keyboard_handle = input::spawn_keyboard_monitor(Arc::clone(&shutdown), key_tx);

    let mut session = if args.no_session {
        None
    } else {
        match SessionLog::start(&args.session_dir) {
            Ok(log) => {
                info!("Session log: {:?}", log.path());
                Some(log)
            }
            Err(e) => {
                warn!("Session log disabled: {:#}", e);
                None
            }
        }
    };

    let port = config.ingest.port;
    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(config.bout.tick_hz.max(1)));
    let mut channel = IngestionChannel::from_config(&config.ingest);
    let mut bout = Bout::new(config);

    info!("strikesync {}", env!("CARGO_PKG_VERSION"));
    println!("Press space to start, r for a rematch, q or Esc to quit");

    let mut last_tick = Instant::now();
    let mut next_tick = last_tick + tick_interval;
    let mut pending = Vec::new();

    while !shutdown.is_shutdown() {
        for command in key_rx.try_iter() {
            match command {
                KeyCommand::Start => pending.extend(bout.start_countdown()),
                KeyCommand::Rematch => {
                    channel.stop();
                    bout.rematch();
                    println!("Rematch! Press space to start");
                }
                KeyCommand::Quit => shutdown.trigger(),
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last_tick).min(MAX_TICK);
        last_tick = now;
        pending.extend(bout.tick(dt.as_secs_f64(), &channel));

        for event in pending.drain(..) {
            print_event(bout.clock(), &event);
            if let Some(log) = session.as_mut()
                && let Err(e) = log.record(bout.clock(), &event)
            {
                warn!("Failed to write session log: {:#}", e);
            }

            match event {
                BoutEvent::Fight => {
                    if let Err(e) = channel.start(port) {
                        error!("Pose ingestion unavailable: {}", e);
                    }
                }
                BoutEvent::MatchOver { .. } => {
                    channel.stop();
                    println!("Press r for a rematch, q to quit");
                }
                _ => {}
            }
        }

        if shutdown.sleep_until(next_tick) {
            break;
        }
        next_tick += tick_interval;
        let now = Instant::now();
        if next_tick < now {
            debug!("Game loop fell behind, resynchronising");
            next_tick = now + tick_interval;
        }
    }

    channel.stop();
    if let Some(log) = session.as_mut() {
        log.flush()?;
    }
    info!("Shutting down");
    Ok(())
}

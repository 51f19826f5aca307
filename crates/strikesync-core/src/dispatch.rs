//! Per-tick packet dispatch.
//!
//! Drains the ingestion queue, parses each message as a [`PosePacket`] and
//! routes every player entry to the pose processor for its slot. A message
//! that fails to parse is logged and dropped; the rest of the queue is still
//! processed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ingest::MessageSource;
use crate::pose::{PlayerSlot, PoseProcessor};
use crate::skeleton::{KeypointFrame, Landmark};

/// Longest excerpt of a bad message included in the log line
const LOG_EXCERPT_LEN: usize = 200;

/// One datagram from the pose server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosePacket {
    pub players: Vec<PlayerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: i64,
    pub landmarks: Vec<Landmark>,
}

impl PosePacket {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Rolling one-second count of parsed packets
#[derive(Debug, Default)]
pub struct PacketRate {
    timer: f64,
    count: u32,
    last_window: u32,
}

impl PacketRate {
    pub fn record(&mut self) {
        self.count += 1;
    }

    /// Advance the window; logs the count once per second when non-zero
    pub fn advance(&mut self, dt: f64) {
        self.timer += dt;
        if self.timer > 1.0 {
            if self.count > 0 {
                info!("Received {} packets in the last second", self.count);
            }
            self.last_window = self.count;
            self.count = 0;
            self.timer = 0.0;
        }
    }

    /// Packets counted in the last completed window
    pub fn packets_per_second(&self) -> u32 {
        self.last_window
    }
}

#[derive(Debug, Default)]
pub struct FrameDispatcher {
    rate: PacketRate,
}

impl FrameDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain `source` and route every frame. Returns how many messages parsed.
    pub fn dispatch<S: MessageSource + ?Sized>(
        &mut self,
        source: &S,
        dt: f64,
        processors: [&mut PoseProcessor; 2],
    ) -> usize {
        let [p1, p2] = processors;
        let mut parsed = 0;

        for message in source.dequeue_all() {
            match self.dispatch_message(&message, [&mut *p1, &mut *p2]) {
                Ok(()) => parsed += 1,
                Err(e) => warn!(
                    "Error parsing pose packet: {}; JSON: {}",
                    e,
                    excerpt(&message)
                ),
            }
        }

        self.rate.advance(dt);
        parsed
    }

    /// Parse and route a single message
    pub fn dispatch_message(
        &mut self,
        json: &str,
        processors: [&mut PoseProcessor; 2],
    ) -> Result<()> {
        let packet = PosePacket::parse(json)?;
        self.rate.record();

        let [p1, p2] = processors;
        for entry in &packet.players {
            let Some(slot) = PlayerSlot::from_wire_id(entry.id) else {
                continue;
            };
            let processor = match slot {
                PlayerSlot::Player1 => &mut *p1,
                PlayerSlot::Player2 => &mut *p2,
            };
            if processor.slot() != Some(slot) {
                processor.assign(slot);
            }
            match KeypointFrame::from_slice(&entry.landmarks) {
                Ok(frame) => {
                    processor.receive(&frame);
                }
                Err(e) => debug!("{} entry skipped: {}", slot, e),
            }
        }

        Ok(())
    }

    pub fn packets_per_second(&self) -> u32 {
        self.rate.packets_per_second()
    }
}

fn excerpt(message: &str) -> &str {
    match message.char_indices().nth(LOG_EXCERPT_LEN) {
        Some((end, _)) => &message[..end],
        None => message,
    }
}

//! Match orchestration.
//!
//! A [`Bout`] owns both fighters and drives the whole pipeline from a single
//! `tick(dt, source)` call made by an external fixed-rate loop:
//!
//! 1. advance the game clock
//! 2. drain the message source into the two pose processors
//! 3. ease both skeletons toward their targets
//! 4. run the countdown, or while fighting: gestures, hit probes, combat
//! 5. after the result, keep the combat timers running so a knocked-out
//!    fighter still recovers
//!
//! Everything the outside world reacts to (countdown numbers, punches, hits,
//! combat transitions, the result) is returned as [`BoutEvent`]s.

use strum::{Display, IntoStaticStr};
use tracing::info;

use crate::combat::{CombatEvent, CombatResolver, FighterState};
use crate::config::Config;
use crate::dispatch::FrameDispatcher;
use crate::gesture::{GestureDetector, PunchEvent};
use crate::hitbox::{HandHitboxes, HitReport};
use crate::ingest::MessageSource;
use crate::pose::{Placement, PlayerSlot, PoseProcessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Phase {
    Waiting,
    Countdown,
    Fighting,
    Finished { winner: PlayerSlot },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoutEvent {
    /// Whole seconds left before the fight starts
    CountdownTick(u32),
    /// Fighting started; ingestion should be running
    Fight,
    Punch {
        fighter: PlayerSlot,
        event: PunchEvent,
    },
    Hit {
        attacker: PlayerSlot,
        report: HitReport,
        damage: f32,
    },
    Combat(CombatEvent),
    /// A fighter was knocked out; ingestion should stop
    MatchOver { winner: PlayerSlot },
}

pub struct Fighter {
    pub pose: PoseProcessor,
    pub gesture: GestureDetector,
    pub hitboxes: HandHitboxes,
}

impl Fighter {
    fn new(slot: PlayerSlot, config: &Config) -> Self {
        let placement = Placement::spawn(slot, &config.arena);
        Self {
            pose: PoseProcessor::new(&config.pose, &config.arena, placement),
            gesture: GestureDetector::new(config.gesture.clone()),
            hitboxes: HandHitboxes::new(config.hitbox.clone()),
        }
    }
}

pub struct Bout {
    config: Config,
    phase: Phase,
    clock: f64,
    countdown_left: f64,
    last_announced: u32,
    dispatcher: FrameDispatcher,
    fighters: [Fighter; 2],
    combat: CombatResolver,
}

impl Bout {
    pub fn new(config: Config) -> Self {
        let fighters = PlayerSlot::BOTH.map(|slot| Fighter::new(slot, &config));
        let combat = CombatResolver::new(config.combat.clone());
        Self {
            config,
            phase: Phase::Waiting,
            clock: 0.0,
            countdown_left: 0.0,
            last_announced: 0,
            dispatcher: FrameDispatcher::new(),
            fighters,
            combat,
        }
    }

    /// Begin the pre-fight countdown. Only valid while waiting.
    pub fn start_countdown(&mut self) -> Vec<BoutEvent> {
        if self.phase != Phase::Waiting {
            return Vec::new();
        }

        self.countdown_left = self.config.bout.countdown_secs;
        if self.countdown_left <= 0.0 {
            return vec![self.start_fight()];
        }

        self.phase = Phase::Countdown;
        self.last_announced = self.countdown_left.ceil() as u32;
        info!("Countdown started");
        vec![BoutEvent::CountdownTick(self.last_announced)]
    }

    /// Enter the fighting phase immediately, skipping any countdown.
    ///
    /// Depth calibration is taken again from the first frame after this call.
    pub fn start_fight(&mut self) -> BoutEvent {
        for fighter in &mut self.fighters {
            fighter.gesture.reset();
            fighter.hitboxes.reset();
        }
        self.phase = Phase::Fighting;
        info!("Fight!");
        BoutEvent::Fight
    }

    /// Back to waiting with full health and fighters at their spawn points
    pub fn rematch(&mut self) {
        for slot in PlayerSlot::BOTH {
            let fighter = &mut self.fighters[slot.index()];
            fighter.pose.reset(Placement::spawn(slot, &self.config.arena));
            fighter.gesture.reset();
            fighter.hitboxes.reset();
        }
        self.combat.reset();
        self.phase = Phase::Waiting;
        info!("Rematch: waiting for players");
    }

    /// Run one game-loop tick of `dt` seconds
    pub fn tick<S: MessageSource + ?Sized>(&mut self, dt: f64, source: &S) -> Vec<BoutEvent> {
        self.clock += dt;
        let mut events = Vec::new();

        let [p1, p2] = &mut self.fighters;
        self.dispatcher.dispatch(source, dt, [&mut p1.pose, &mut p2.pose]);
        for fighter in &mut self.fighters {
            fighter.pose.tick();
        }

        match self.phase {
            Phase::Countdown => self.advance_countdown(dt, &mut events),
            Phase::Fighting => self.fight(dt, &mut events),
            Phase::Finished { .. } => self.advance_combat(dt, &mut events),
            Phase::Waiting => {}
        }

        events
    }

    fn advance_countdown(&mut self, dt: f64, events: &mut Vec<BoutEvent>) {
        self.countdown_left -= dt;
        if self.countdown_left <= 0.0 {
            events.push(self.start_fight());
            return;
        }

        let remaining = self.countdown_left.ceil() as u32;
        if remaining != self.last_announced {
            self.last_announced = remaining;
            events.push(BoutEvent::CountdownTick(remaining));
        }
    }

    fn fight(&mut self, dt: f64, events: &mut Vec<BoutEvent>) {
        let now = self.clock;

        for slot in PlayerSlot::BOTH {
            let Fighter {
                pose,
                gesture,
                hitboxes,
            } = &mut self.fighters[slot.index()];

            let state = self.combat.state(slot);
            if state == FighterState::Stunned {
                gesture.expire_hitboxes(now, hitboxes);
                continue;
            }

            let output = gesture.evaluate(
                now,
                dt as f32,
                pose,
                state == FighterState::KnockedOut,
                hitboxes,
            );
            events.extend(
                output
                    .punches
                    .into_iter()
                    .map(|event| BoutEvent::Punch { fighter: slot, event }),
            );
        }

        let [p1, p2] = &mut self.fighters;
        let landed: Vec<(PlayerSlot, HitReport)> = p1
            .hitboxes
            .probe(&p1.pose, &p1.gesture, &p2.pose)
            .into_iter()
            .map(|r| (PlayerSlot::Player1, r))
            .chain(
                p2.hitboxes
                    .probe(&p2.pose, &p2.gesture, &p1.pose)
                    .into_iter()
                    .map(|r| (PlayerSlot::Player2, r)),
            )
            .collect();

        for (attacker, report) in landed {
            if let Some(damage) = self.combat.resolve_hit(attacker.opponent(), now, &report) {
                events.push(BoutEvent::Hit {
                    attacker,
                    report,
                    damage,
                });
            }
        }

        self.advance_combat(dt, events);
    }

    /// Run combat timers (stun, recovery, regeneration) and forward transitions
    fn advance_combat(&mut self, dt: f64, events: &mut Vec<BoutEvent>) {
        self.combat.tick(self.clock, dt);
        for event in self.combat.drain_events() {
            events.push(BoutEvent::Combat(event));
            if let CombatEvent::KnockedOut { fighter } = event
                && self.phase == Phase::Fighting
            {
                let winner = fighter.opponent();
                self.phase = Phase::Finished { winner };
                info!("{} wins", winner);
                events.push(BoutEvent::MatchOver { winner });
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn winner(&self) -> Option<PlayerSlot> {
        match self.phase {
            Phase::Finished { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn is_fighting(&self) -> bool {
        self.phase == Phase::Fighting
    }

    /// Seconds of game time since the bout was created
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn fighter(&self, slot: PlayerSlot) -> &Fighter {
        &self.fighters[slot.index()]
    }

    pub fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn packets_per_second(&self) -> u32 {
        self.dispatcher.packets_per_second()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::dispatch::{PlayerEntry, PosePacket};
    use crate::gesture::Hand;
    use crate::ingest::{IngestionChannel, ScriptedSource};
    use crate::skeleton::{BodyPart, KEYPOINT_COUNT, Landmark};
    use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
    use std::thread;
    use std::time::{Duration, Instant};

    const DT: f64 = 0.05;

    fn stance() -> Vec<Landmark> {
        let mut lm = vec![Landmark::new(0.5, 0.5); KEYPOINT_COUNT];
        lm[BodyPart::LeftShoulder.index()] = Landmark::new(0.4, 0.3);
        lm[BodyPart::RightShoulder.index()] = Landmark::new(0.6, 0.3);
        lm[BodyPart::LeftWrist.index()] = Landmark::new(0.45, 0.35);
        lm[BodyPart::RightWrist.index()] = Landmark::new(0.55, 0.35);
        lm[BodyPart::LeftHip.index()] = Landmark::new(0.45, 0.7);
        lm[BodyPart::RightHip.index()] = Landmark::new(0.55, 0.7);
        lm
    }

    fn jab() -> Vec<Landmark> {
        let mut lm = stance();
        lm[BodyPart::LeftWrist.index()].x += 0.4;
        lm
    }

    fn wide() -> Vec<Landmark> {
        let mut lm = stance();
        lm[BodyPart::LeftShoulder.index()].x = 0.35;
        lm[BodyPart::RightShoulder.index()].x = 0.65;
        lm
    }

    fn packet(players: &[(i64, Vec<Landmark>)]) -> String {
        let packet = PosePacket {
            players: players
                .iter()
                .map(|(id, landmarks)| PlayerEntry {
                    id: *id,
                    landmarks: landmarks.clone(),
                })
                .collect(),
        };
        serde_json::to_string(&packet).unwrap()
    }

    fn unmirrored() -> Config {
        let mut config = Config::default();
        config.pose.mirror_input = false;
        config
    }

    /// Fighters close enough for a jab to reach
    fn close_quarters(mut config: Config) -> Config {
        config.arena = ArenaConfig {
            player1_spawn_x: -0.15,
            player2_spawn_x: 0.15,
            ..ArenaConfig::default()
        };
        config
    }

    fn step(bout: &mut Bout, source: &ScriptedSource, message: String) -> Vec<BoutEvent> {
        source.push(message);
        bout.tick(DT, source)
    }

    fn punches(events: &[BoutEvent], fighter: PlayerSlot, hand: Hand) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, BoutEvent::Punch { fighter: f, event } if *f == fighter && event.hand == hand))
            .count()
    }

    #[test]
    fn test_single_jab_yields_one_left_punch() {
        let mut bout = Bout::new(unmirrored());
        let source = ScriptedSource::new();
        bout.start_fight();

        let mut events = Vec::new();
        events.extend(step(&mut bout, &source, packet(&[(0, stance())])));
        events.extend(step(&mut bout, &source, packet(&[(0, jab())])));
        events.extend(step(&mut bout, &source, packet(&[(0, stance())])));

        assert_eq!(punches(&events, PlayerSlot::Player1, Hand::Left), 1);
        assert_eq!(punches(&events, PlayerSlot::Player1, Hand::Right), 0);
        assert_eq!(punches(&events, PlayerSlot::Player2, Hand::Left), 0);
    }

    /// Tick with a zero step until `arrived`, so the datagram is dispatched
    /// without advancing the clock that punch velocity is measured against.
    fn drain_until(bout: &mut Bout, channel: &IngestionChannel, arrived: impl Fn(&Bout) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !arrived(bout) {
            assert!(Instant::now() < deadline, "datagram not received");
            thread::sleep(Duration::from_millis(5));
            assert!(bout.tick(0.0, channel).is_empty());
        }
    }

    #[test]
    fn test_jab_over_udp_yields_one_left_punch() {
        let mut channel = IngestionChannel::new(Duration::from_millis(20));
        let addr = channel.start(0).unwrap();
        let target = SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()));
        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();

        let mut bout = Bout::new(unmirrored());
        bout.start_fight();
        let left_wrist_x =
            |b: &Bout| b.fighter(PlayerSlot::Player1).pose.target(BodyPart::LeftWrist).x;

        let mut events = Vec::new();
        client.send_to(packet(&[(0, stance())]).as_bytes(), target).unwrap();
        drain_until(&mut bout, &channel, |b| {
            b.fighter(PlayerSlot::Player1).pose.has_frame()
        });
        events.extend(bout.tick(DT, &channel));
        let rest_x = left_wrist_x(&bout);

        // Wrist out by 0.4 over one 50 ms tick, then straight back
        client.send_to(packet(&[(0, jab())]).as_bytes(), target).unwrap();
        drain_until(&mut bout, &channel, |b| left_wrist_x(b) > rest_x + 0.3);
        events.extend(bout.tick(DT, &channel));

        client.send_to(packet(&[(0, stance())]).as_bytes(), target).unwrap();
        drain_until(&mut bout, &channel, |b| left_wrist_x(b) < rest_x + 0.1);
        events.extend(bout.tick(DT, &channel));

        channel.stop();
        assert_eq!(punches(&events, PlayerSlot::Player1, Hand::Left), 1);
        assert_eq!(punches(&events, PlayerSlot::Player1, Hand::Right), 0);
        assert_eq!(punches(&events, PlayerSlot::Player2, Hand::Left), 0);
    }

    #[test]
    fn test_mirrored_jab_drives_avatar_right_hand() {
        let mut bout = Bout::new(Config::default());
        let source = ScriptedSource::new();
        bout.start_fight();

        let mut events = Vec::new();
        events.extend(step(&mut bout, &source, packet(&[(0, stance())])));
        events.extend(step(&mut bout, &source, packet(&[(0, jab())])));
        events.extend(step(&mut bout, &source, packet(&[(0, stance())])));

        assert_eq!(punches(&events, PlayerSlot::Player1, Hand::Right), 1);
        assert_eq!(punches(&events, PlayerSlot::Player1, Hand::Left), 0);
    }

    #[test]
    fn test_no_gestures_before_fight() {
        let mut bout = Bout::new(unmirrored());
        let source = ScriptedSource::new();

        let mut events = Vec::new();
        events.extend(step(&mut bout, &source, packet(&[(0, stance())])));
        events.extend(step(&mut bout, &source, packet(&[(0, jab())])));

        assert!(events.is_empty());
        assert_eq!(bout.phase(), Phase::Waiting);
        // Poses still track while waiting
        assert!(bout.fighter(PlayerSlot::Player1).pose.has_frame());
    }

    #[test]
    fn test_countdown_announces_each_second() {
        let mut bout = Bout::new(Config::default());
        let source = ScriptedSource::new();

        let mut events = bout.start_countdown();
        assert_eq!(bout.phase(), Phase::Countdown);
        for _ in 0..12 {
            events.extend(bout.tick(0.25, &source));
        }

        assert_eq!(
            events,
            vec![
                BoutEvent::CountdownTick(3),
                BoutEvent::CountdownTick(2),
                BoutEvent::CountdownTick(1),
                BoutEvent::Fight,
            ]
        );
        assert!(bout.is_fighting());
    }

    #[test]
    fn test_countdown_only_from_waiting() {
        let mut bout = Bout::new(Config::default());
        bout.start_fight();
        assert!(bout.start_countdown().is_empty());
        assert!(bout.is_fighting());
    }

    #[test]
    fn test_zero_countdown_fights_immediately() {
        let mut config = Config::default();
        config.bout.countdown_secs = 0.0;
        let mut bout = Bout::new(config);
        assert_eq!(bout.start_countdown(), vec![BoutEvent::Fight]);
        assert!(bout.is_fighting());
    }

    #[test]
    fn test_knockout_ends_match() {
        let mut config = close_quarters(unmirrored());
        config.combat.max_health = 5.0;
        let mut bout = Bout::new(config);
        let source = ScriptedSource::new();
        bout.start_fight();

        step(&mut bout, &source, packet(&[(0, stance()), (1, stance())]));
        let events = step(&mut bout, &source, packet(&[(0, jab()), (1, stance())]));

        assert!(events.iter().any(|e| matches!(
            e,
            BoutEvent::Hit { attacker: PlayerSlot::Player1, .. }
        )));
        assert!(events.contains(&BoutEvent::Combat(CombatEvent::KnockedOut {
            fighter: PlayerSlot::Player2
        })));
        assert_eq!(
            events.last(),
            Some(&BoutEvent::MatchOver {
                winner: PlayerSlot::Player1
            })
        );
        assert_eq!(bout.winner(), Some(PlayerSlot::Player1));

        // Nothing happens after the result
        step(&mut bout, &source, packet(&[(0, stance()), (1, stance())]));
        let after = step(&mut bout, &source, packet(&[(0, jab()), (1, stance())]));
        assert!(after.is_empty());
    }

    #[test]
    fn test_knocked_out_fighter_recovers_after_match() {
        let mut config = close_quarters(unmirrored());
        config.combat.max_health = 5.0;
        config.combat.regen_enabled = false;
        let recovery = config.combat.knockout_recovery_secs;
        let mut bout = Bout::new(config);
        let source = ScriptedSource::new();
        bout.start_fight();

        step(&mut bout, &source, packet(&[(0, stance()), (1, stance())]));
        step(&mut bout, &source, packet(&[(0, jab()), (1, stance())]));
        assert_eq!(bout.winner(), Some(PlayerSlot::Player1));
        assert!(bout.combat().is_knocked_out(PlayerSlot::Player2));

        let recovered = |events: &[BoutEvent]| {
            events
                .iter()
                .filter(|e| matches!(
                    e,
                    BoutEvent::Combat(CombatEvent::Recovered {
                        fighter: PlayerSlot::Player2,
                        ..
                    })
                ))
                .count()
        };

        // Short of the recovery time: still down
        let ticks = (recovery / DT) as usize;
        let mut events = Vec::new();
        for _ in 0..ticks - 10 {
            events.extend(bout.tick(DT, &source));
        }
        assert_eq!(recovered(&events), 0);
        assert!(bout.combat().is_knocked_out(PlayerSlot::Player2));

        for _ in 0..20 {
            events.extend(bout.tick(DT, &source));
        }
        assert_eq!(recovered(&events), 1);
        assert_eq!(bout.combat().state(PlayerSlot::Player2), FighterState::Active);
        assert!((bout.combat().health(PlayerSlot::Player2) - 1.5).abs() < 1e-5);
        // The result stands
        assert_eq!(bout.winner(), Some(PlayerSlot::Player1));
        assert!(!events.iter().any(|e| matches!(e, BoutEvent::MatchOver { .. })));
    }

    #[test]
    fn test_stunned_fighter_cannot_move() {
        let mut bout = Bout::new(close_quarters(unmirrored()));
        let source = ScriptedSource::new();
        bout.start_fight();

        step(&mut bout, &source, packet(&[(0, stance()), (1, stance())]));
        let events = step(&mut bout, &source, packet(&[(0, jab()), (1, stance())]));
        assert!(events.iter().any(|e| matches!(e, BoutEvent::Hit { .. })));
        assert_eq!(bout.combat().state(PlayerSlot::Player2), FighterState::Stunned);

        let before = bout.fighter(PlayerSlot::Player2).pose.placement().position.x;
        step(&mut bout, &source, packet(&[(0, stance()), (1, wide())]));
        let after = bout.fighter(PlayerSlot::Player2).pose.placement().position.x;
        assert_eq!(before, after);
    }

    #[test]
    fn test_rematch_resets_state() {
        let mut config = close_quarters(unmirrored());
        config.combat.max_health = 5.0;
        let mut bout = Bout::new(config);
        let source = ScriptedSource::new();
        bout.start_fight();

        step(&mut bout, &source, packet(&[(0, stance()), (1, stance())]));
        step(&mut bout, &source, packet(&[(0, jab()), (1, stance())]));
        assert!(bout.winner().is_some());

        bout.rematch();
        assert_eq!(bout.phase(), Phase::Waiting);
        assert_eq!(bout.winner(), None);
        assert_eq!(bout.combat().health(PlayerSlot::Player2), 5.0);
        assert!(!bout.fighter(PlayerSlot::Player1).pose.has_frame());
        assert_eq!(
            bout.fighter(PlayerSlot::Player2).pose.placement().position.x,
            0.15
        );
    }

    #[test]
    fn test_clock_advances_every_tick() {
        let mut bout = Bout::new(Config::default());
        let source = ScriptedSource::new();
        bout.tick(0.5, &source);
        bout.tick(0.25, &source);
        assert!((bout.clock() - 0.75).abs() < 1e-12);
    }
}

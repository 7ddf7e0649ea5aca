//! Session state and authoritative tick loop

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::arena::{ArenaConfig, ArenaGeometry};
use crate::game::bot::{BotAgent, BotDecision, BotView};
use crate::game::collision::{CollisionResolver, ENTITY_RADIUS};
use crate::game::evaluator::{TagCandidate, TagContext, TaggingEvaluator};
use crate::game::movement::{MotionEvent, MoveStats, MovementIntegrator, PhysicsState};
use crate::game::snapshot::SnapshotBuilder;
use crate::game::tag::{TagRound, TagRules};
use crate::game::{IntentFrame, Pose, SessionInput};
use crate::protocol::{
    validate_pose_report, ClientMsg, EntityInfo, EntitySnapshot, GameEvent, ServerMsg,
};
use crate::util::time::{
    tick_delta, unix_millis, SecondAccumulator, SIMULATION_TPS, SNAPSHOT_TPS,
    TICK_DURATION_MICROS,
};

/// How long the landing-dust flag stays set after touchdown
const LANDING_DUST_MS: u64 = 300;

/// Entity kinds share the same pose/physics core; the kind only decides
/// where the intent comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Human,
    Bot,
}

/// One participant in the session (authoritative)
#[derive(Debug)]
pub struct EntityState {
    pub id: Uuid,
    pub display_name: String,
    pub kind: EntityKind,
    pub pose: Pose,
    pub physics: PhysicsState,
    /// Latest intent from the input collaborator (humans only)
    pub current_intent: IntentFrame,
    pub last_input_seq: u32,
    /// Pose arrives from peer reports instead of local integration
    pub remote: bool,
    pub spawn_time: u64,
}

impl EntityState {
    fn new(id: Uuid, display_name: String, kind: EntityKind, pose: Pose, stats: &MoveStats) -> Self {
        Self {
            id,
            display_name,
            kind,
            pose,
            physics: PhysicsState::new(stats),
            current_intent: IntentFrame::idle(pose.yaw),
            last_input_seq: 0,
            remote: false,
            spawn_time: unix_millis(),
        }
    }

    fn info(&self) -> EntityInfo {
        EntityInfo {
            entity_id: self.id,
            display_name: self.display_name.clone(),
            is_bot: self.kind == EntityKind::Bot,
        }
    }
}

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Round length used for StartRound requests without a duration
    pub default_round_secs: u32,
    /// Autonomous opponents created at session start
    pub bot_count: usize,
    /// Debug both-bots mode: the initial holder draw never lands on the
    /// human entity
    pub force_bot_it: bool,
    pub arena: ArenaConfig,
    pub rules: TagRules,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_round_secs: 120,
            bot_count: 1,
            force_bot_it: false,
            arena: ArenaConfig::default(),
            rules: TagRules::default(),
        }
    }
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<SessionInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub entity_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl SessionHandle {
    pub fn entity_count(&self) -> usize {
        self.entity_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Registry of all active sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_entities(&self) -> usize {
        self.sessions.iter().map(|s| s.value().entity_count()).sum()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game session: entity table, round state, bot agents,
/// and the per-tick orchestration
pub struct GameSession {
    id: Uuid,
    seed: u64,
    options: SessionOptions,
    arena: ArenaGeometry,
    stats: MoveStats,
    tick: u64,
    entities: HashMap<Uuid, EntityState>,
    bots: HashMap<Uuid, BotAgent>,
    round: TagRound,
    evaluator: TaggingEvaluator,
    timer_acc: SecondAccumulator,
    rng: ChaCha8Rng,
    human_id: Option<Uuid>,
    closing: bool,
    pending_events: Vec<GameEvent>,
    input_rx: mpsc::Receiver<SessionInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    entity_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl GameSession {
    /// Create a new session with its bots already spawned
    pub fn new(id: Uuid, seed: u64, options: SessionOptions) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let entity_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handle = SessionHandle {
            id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            entity_count: entity_count.clone(),
        };

        let arena = ArenaGeometry::generate(seed, &options.arena);
        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;

        let mut session = Self {
            id,
            seed,
            options: options.clone(),
            arena,
            stats: MoveStats::standard(),
            tick: 0,
            entities: HashMap::new(),
            bots: HashMap::new(),
            round: TagRound::new(options.rules),
            evaluator: TaggingEvaluator::new(),
            timer_acc: SecondAccumulator::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            human_id: None,
            closing: false,
            pending_events: Vec::new(),
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            entity_count,
        };

        for i in 0..options.bot_count {
            session.spawn_bot(format!("bot-{}", i + 1));
        }

        (session, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(session_id = %self.id, "session started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            self.process_inputs();

            // Run simulation tick
            self.run_tick(tick_delta());

            // Build and broadcast snapshot if needed
            if self.snapshot_builder.should_send() {
                let now = unix_millis();
                let entities = self.build_entity_snapshots(now);
                let events = std::mem::take(&mut self.pending_events);
                let snapshot =
                    self.snapshot_builder
                        .build(self.tick, self.round.snapshot(), entities, events);
                let _ = self.snapshot_tx.send(snapshot);
            }

            if self.closing {
                info!(session_id = %self.id, "session closing");
                break;
            }
        }

        if self.round.is_active() {
            self.round.end_round();
            let _ = self.snapshot_tx.send(ServerMsg::RoundEnded {
                it_holder: self.round.holder(),
            });
        }
        self.round.reset();
    }

    /// Process all pending collaborator inputs
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input.msg {
                ClientMsg::Join {
                    display_name,
                    remote,
                } => {
                    self.handle_join(input.entity_id, display_name, remote);
                }
                ClientMsg::IntentTick {
                    seq,
                    move_x,
                    move_z,
                    sprint,
                    jump,
                    thrust,
                    rcs,
                    rcs_lift,
                    thrust_tap,
                    auto_run,
                    yaw,
                } => {
                    // Auto-run stacks additively with the forward axis
                    let move_z = if auto_run { move_z + 1.0 } else { move_z };
                    let frame = IntentFrame {
                        seq,
                        move_x,
                        move_z,
                        sprint,
                        jump,
                        thrust,
                        rcs,
                        rcs_lift: rcs_lift as f32,
                        thrust_tap,
                        yaw,
                    }
                    .sanitized();
                    self.handle_intent(input.entity_id, frame);
                }
                ClientMsg::PoseReport { x, y, z, yaw } => {
                    self.handle_pose_report(input.entity_id, x, y, z, yaw);
                }
                ClientMsg::StartRound { duration_secs } => {
                    let duration = if duration_secs > 0 {
                        duration_secs
                    } else {
                        self.options.default_round_secs
                    };
                    self.start_round(duration);
                }
                ClientMsg::EndRound => {
                    if self.round.is_active() {
                        self.round.end_round();
                        self.timer_acc.reset();
                        let _ = self.snapshot_tx.send(ServerMsg::RoundEnded {
                            it_holder: self.round.holder(),
                        });
                        self.snapshot_builder.force_next();
                    }
                }
                ClientMsg::SetSecondBot { enabled } => {
                    self.set_second_bot(enabled);
                }
                ClientMsg::Ping { t } => {
                    let _ = self.snapshot_tx.send(ServerMsg::Pong { t });
                }
                ClientMsg::Leave => {
                    self.handle_leave(input.entity_id);
                }
            }
        }
    }

    fn handle_join(&mut self, entity_id: Uuid, display_name: Option<String>, remote: bool) {
        if self.entities.contains_key(&entity_id) {
            warn!(entity_id = %entity_id, "entity already in session");
            return;
        }

        let name = display_name
            .unwrap_or_else(|| format!("player_{}", &entity_id.to_string()[..8]));
        let pose = self.generate_spawn_pose();
        let mut entity = EntityState::new(entity_id, name, EntityKind::Human, pose, &self.stats);
        entity.remote = remote;

        let info = entity.info();
        self.entities.insert(entity_id, entity);
        self.human_id = Some(entity_id);
        self.store_entity_count();

        let _ = self.snapshot_tx.send(ServerMsg::EntityJoined {
            entity: info,
        });
        let _ = self.snapshot_tx.send(ServerMsg::SessionJoined {
            session_id: self.id,
            seed: self.seed,
            entities: self.entities.values().map(|e| e.info()).collect(),
        });

        info!(
            session_id = %self.id,
            entity_id = %entity_id,
            entity_count = self.entities.len(),
            "human joined session"
        );
    }

    fn handle_intent(&mut self, entity_id: Uuid, frame: IntentFrame) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            if frame.seq > entity.last_input_seq {
                entity.last_input_seq = frame.seq;
                entity.current_intent = frame;
            }
        }
    }

    fn handle_pose_report(&mut self, entity_id: Uuid, x: f32, y: f32, z: f32, yaw: f32) {
        // Boundary check happens before the report touches the simulation
        if !validate_pose_report(x, y, z, yaw) {
            debug!(entity_id = %entity_id, "pose report rejected by boundary check");
            return;
        }

        if let Some(entity) = self.entities.get_mut(&entity_id) {
            if entity.remote {
                entity.pose = Pose::new(x, y, z, yaw);
            }
        }
    }

    fn handle_leave(&mut self, entity_id: Uuid) {
        if self.remove_entity(entity_id, "left") && self.human_id == Some(entity_id) {
            self.human_id = None;
            self.closing = true;
        }
    }

    /// Start a tag round over the current entity table
    fn start_round(&mut self, duration_secs: u32) {
        let ids: Vec<Uuid> = self.entities.keys().copied().collect();

        // Hard constraint from the both-bots debug mode: the human never
        // receives the initial "it"
        let excluded = if self.options.force_bot_it {
            self.human_id
        } else {
            None
        };

        match self
            .round
            .start_round(duration_secs, &ids, excluded, &mut self.rng)
        {
            Some(holder) => {
                self.evaluator.reset();
                self.timer_acc.reset();
                let _ = self.snapshot_tx.send(ServerMsg::RoundStarted {
                    duration_secs,
                    it_holder: holder,
                });
                self.snapshot_builder.force_next();
            }
            None => {
                let _ = self.snapshot_tx.send(ServerMsg::Error {
                    code: "no_eligible_entities".to_string(),
                    message: "cannot start a round without eligible entities".to_string(),
                });
            }
        }
    }

    /// Apply the second-opponent debug toggle
    fn set_second_bot(&mut self, enabled: bool) {
        let second = self
            .bots
            .keys()
            .copied()
            .find(|id| self.entities.get(id).is_some_and(|e| e.display_name == "bot-2"));

        match (enabled, second) {
            (true, None) => {
                self.spawn_bot("bot-2".to_string());
            }
            (false, Some(id)) => {
                self.remove_entity(id, "toggled off");
            }
            _ => {}
        }
    }

    /// Run a single simulation tick. Movement for every entity completes
    /// before tagging evaluation so tag checks always see post-movement
    /// poses.
    fn run_tick(&mut self, dt: f32) {
        self.tick += 1;
        let now = unix_millis();

        // 1. Bot decisions against the current (pre-movement) poses
        let decisions = self.collect_bot_decisions(dt, now);

        // 2. Integrate movement for all entities
        let ids: Vec<Uuid> = self.entities.keys().copied().collect();
        for id in &ids {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };

            // Frozen entities produce no movement intent
            let intent = if self.round.is_frozen(*id, now) {
                IntentFrame::idle(entity.pose.yaw)
            } else if let Some(decision) = decisions.get(id) {
                decision.intent
            } else {
                entity.current_intent
            };

            self.integrate_entity(*id, &intent, dt, now);
        }

        // Entity-vs-entity push-back after individual integration
        self.separate_overlapping_entities();

        // 3. Tagging on the post-movement pose snapshot
        self.evaluate_tags(&decisions, now);

        // 4. Round timer, decoupled from frame rate
        if self.round.is_active() {
            let seconds = self.timer_acc.advance(dt);
            if seconds > 0 && self.round.advance_timer(seconds) {
                let _ = self.snapshot_tx.send(ServerMsg::RoundEnded {
                    it_holder: self.round.holder(),
                });
                self.snapshot_builder.force_next();
            }
        }
    }

    fn collect_bot_decisions(&mut self, dt: f32, now: u64) -> HashMap<Uuid, BotDecision> {
        let mut decisions = HashMap::new();
        let bot_ids: Vec<Uuid> = self.bots.keys().copied().collect();

        for bot_id in bot_ids {
            let Some(me) = self.entities.get(&bot_id) else {
                continue;
            };
            let target_id = self.bot_target(bot_id);
            let target = target_id.and_then(|tid| self.entities.get(&tid).map(|e| (tid, &e.pose)));

            let view = BotView {
                me: &me.pose,
                target,
                is_it: self.round.is_holder(bot_id),
                target_is_it: target_id.is_some_and(|tid| self.round.is_holder(tid)),
                round_active: self.round.is_active(),
                frozen: self.round.is_frozen(bot_id, now),
            };

            let tag_distance = self.round.rules().tag_distance;
            if let Some(agent) = self.bots.get_mut(&bot_id) {
                decisions.insert(bot_id, agent.decide(&view, tag_distance, dt, now));
            }
        }

        decisions
    }

    /// The bot's declared target: the current holder when someone else is
    /// "it", otherwise the nearest other entity
    fn bot_target(&self, bot_id: Uuid) -> Option<Uuid> {
        if let Some(holder) = self.round.holder() {
            if holder != bot_id {
                return self.entities.contains_key(&holder).then_some(holder);
            }
        }

        let me = self.entities.get(&bot_id)?;
        self.entities
            .values()
            .filter(|e| e.id != bot_id)
            .min_by(|a, b| {
                let da = me.pose.distance(&a.pose);
                let db = me.pose.distance(&b.pose);
                da.total_cmp(&db)
            })
            .map(|e| e.id)
    }

    fn integrate_entity(&mut self, id: Uuid, intent: &IntentFrame, dt: f32, now: u64) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        if entity.remote {
            // Remote poses come from validated reports, not local physics
            return;
        }

        let mut motion_events = Vec::new();
        entity.pose = MovementIntegrator::step(
            &entity.pose,
            &mut entity.physics,
            intent,
            &self.stats,
            &self.arena,
            dt,
            now,
            &mut motion_events,
        );

        for event in motion_events {
            self.pending_events.push(match event {
                MotionEvent::Footstep => GameEvent::Footstep { entity_id: id },
                MotionEvent::Jumped => GameEvent::Jump { entity_id: id },
                MotionEvent::Landed { impact_speed } => GameEvent::Land {
                    entity_id: id,
                    impact_speed,
                },
                MotionEvent::ThrustStarted => GameEvent::ThrustStart { entity_id: id },
                MotionEvent::ThrustStopped => GameEvent::ThrustStop { entity_id: id },
                MotionEvent::ThrusterBurst => GameEvent::ThrusterBurst { entity_id: id },
            });
        }
    }

    /// Push overlapping locally simulated entities apart, then re-resolve
    /// against geometry. Remote poses are peer-authoritative and stay put.
    fn separate_overlapping_entities(&mut self) {
        let ids: Vec<Uuid> = self
            .entities
            .values()
            .filter(|e| !e.remote)
            .map(|e| e.id)
            .collect();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (pose_a, pose_b) = {
                    let a = &self.entities[&ids[i]].pose;
                    let b = &self.entities[&ids[j]].pose;
                    (*a, *b)
                };

                if !CollisionResolver::entities_overlap(&pose_a, &pose_b, ENTITY_RADIUS) {
                    continue;
                }

                let dx = pose_b.x - pose_a.x;
                let dz = pose_b.z - pose_a.z;
                let dist = (dx * dx + dz * dz).sqrt();

                // Coincident entities get an arbitrary but fixed axis
                let (nx, nz) = if dist < 0.001 {
                    (1.0, 0.0)
                } else {
                    (dx / dist, dz / dist)
                };

                let overlap = ENTITY_RADIUS * 2.0 - dist;
                let push = overlap / 2.0 + 0.01;

                let desired_a = Pose::new(pose_a.x - nx * push, pose_a.y, pose_a.z - nz * push, pose_a.yaw);
                let desired_b = Pose::new(pose_b.x + nx * push, pose_b.y, pose_b.z + nz * push, pose_b.yaw);

                let resolved_a = CollisionResolver::resolve(&pose_a, desired_a, &self.arena);
                let resolved_b = CollisionResolver::resolve(&pose_b, desired_b, &self.arena);

                if let Some(a) = self.entities.get_mut(&ids[i]) {
                    a.pose = resolved_a;
                }
                if let Some(b) = self.entities.get_mut(&ids[j]) {
                    b.pose = resolved_b;
                }
            }
        }
    }

    fn evaluate_tags(&mut self, decisions: &HashMap<Uuid, BotDecision>, now: u64) {
        let poses: HashMap<Uuid, Pose> =
            self.entities.values().map(|e| (e.id, e.pose)).collect();

        let mut candidates: Vec<TagCandidate> = Vec::new();

        // The holder checks its nearest neighbor each tick
        if let Some(holder) = self.round.holder() {
            if let Some(holder_pose) = poses.get(&holder) {
                let nearest = self
                    .entities
                    .values()
                    .filter(|e| e.id != holder)
                    .min_by(|a, b| {
                        holder_pose
                            .distance(&a.pose)
                            .total_cmp(&holder_pose.distance(&b.pose))
                    })
                    .map(|e| (e.id, e.remote));

                if let Some((target, remote)) = nearest {
                    candidates.push(TagCandidate {
                        actor: holder,
                        target,
                        context: if remote {
                            TagContext::Peer
                        } else {
                            TagContext::Bot
                        },
                    });
                }
            }
        }

        // Bot tag requests, decoupled from authority
        for (bot_id, decision) in decisions {
            if let Some(target) = decision.tag_request {
                candidates.push(TagCandidate {
                    actor: *bot_id,
                    target,
                    context: TagContext::Bot,
                });
            }
        }

        if let Some(tag) = self
            .evaluator
            .evaluate(&mut self.round, &poses, &candidates, now)
        {
            debug!(session_id = %self.id, tagger = %tag.tagger, tagged = %tag.tagged,
                   at_ms = tag.at_ms, "tag applied");
            self.pending_events.push(GameEvent::Tag {
                tagger_id: tag.tagger,
                tagged_id: tag.tagged,
            });
            self.snapshot_builder.force_next();
        }
    }

    fn spawn_bot(&mut self, name: String) -> Uuid {
        let id = Uuid::new_v4();
        let pose = self.generate_spawn_pose();
        self.entities
            .insert(id, EntityState::new(id, name, EntityKind::Bot, pose, &self.stats));
        self.bots.insert(id, BotAgent::new(id));
        self.store_entity_count();

        let info = self.entities[&id].info();
        let _ = self.snapshot_tx.send(ServerMsg::EntityJoined { entity: info });

        info!(session_id = %self.id, entity_id = %id, "bot spawned");
        id
    }

    /// Remove an entity and keep round state consistent. Returns whether
    /// the entity existed.
    fn remove_entity(&mut self, id: Uuid, reason: &str) -> bool {
        let Some(entity) = self.entities.remove(&id) else {
            debug!(entity_id = %id, "remove for unknown entity ignored");
            return false;
        };
        self.bots.remove(&id);
        self.evaluator.forget(id);
        self.snapshot_builder.forget(id);
        self.store_entity_count();

        let remaining: Vec<Uuid> = self.entities.keys().copied().collect();
        self.round.handle_entity_removed(id, &remaining, &mut self.rng);

        let _ = self.snapshot_tx.send(ServerMsg::EntityLeft {
            entity_id: id,
            reason: reason.to_string(),
        });

        let alive_secs = unix_millis().saturating_sub(entity.spawn_time) / 1000;
        info!(session_id = %self.id, entity_id = %id, reason, alive_secs, "entity removed");
        true
    }

    /// Spawn pose inside the obstacle-free clearing around the origin
    fn generate_spawn_pose(&mut self) -> Pose {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self.rng.gen_range(1.0..self.options.arena.spawn_clearing * 0.8);
        let yaw = self.rng.gen_range(0.0..std::f32::consts::TAU);
        Pose::on_ground(angle.cos() * distance, angle.sin() * distance, yaw)
    }

    fn build_entity_snapshots(&self, now: u64) -> Vec<EntitySnapshot> {
        self.entities
            .values()
            .map(|e| EntitySnapshot {
                entity_id: e.id,
                x: e.pose.x,
                y: e.pose.y,
                z: e.pose.z,
                yaw: e.pose.yaw,
                vel_x: e.physics.vel_x,
                vel_y: e.physics.vertical_velocity,
                vel_z: e.physics.vel_z,
                thrust_flame: e.physics.thrust_flame(),
                landing_dust: now.saturating_sub(e.physics.landed_at_ms) < LANDING_DUST_MS
                    && e.physics.landed_at_ms > 0,
                is_it: self.round.is_holder(e.id),
                frozen: self.round.is_frozen(e.id, now),
                last_input_seq: e.last_input_seq,
            })
            .collect()
    }

    fn store_entity_count(&self) {
        self.entity_count
            .store(self.entities.len(), std::sync::atomic::Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(options: SessionOptions) -> GameSession {
        let (session, _handle) = GameSession::new(Uuid::new_v4(), 99, options);
        session
    }

    fn join_human(session: &mut GameSession) -> Uuid {
        let id = Uuid::new_v4();
        session.handle_join(id, Some("p1".to_string()), false);
        id
    }

    const DT: f32 = 1.0 / 30.0;

    #[test]
    fn session_spawns_configured_bots() {
        let session = new_session(SessionOptions::default());
        assert_eq!(session.entities.len(), 1);
        assert_eq!(session.bots.len(), 1);
    }

    #[test]
    fn human_joins_and_leaves() {
        let mut session = new_session(SessionOptions::default());
        let human = join_human(&mut session);
        assert_eq!(session.entities.len(), 2);
        assert_eq!(session.human_id, Some(human));

        session.handle_leave(human);
        assert_eq!(session.entities.len(), 1);
        assert!(session.closing);
    }

    #[test]
    fn round_starts_with_a_holder() {
        let mut session = new_session(SessionOptions::default());
        join_human(&mut session);

        session.start_round(30);
        assert!(session.round.is_active());
        assert!(session.round.holder().is_some());
        assert_eq!(session.round.time_remaining(), 30);
    }

    #[test]
    fn force_bot_it_never_selects_the_human() {
        for seed in 0..20 {
            let options = SessionOptions {
                force_bot_it: true,
                bot_count: 2,
                ..SessionOptions::default()
            };
            let (mut session, _) = GameSession::new(Uuid::new_v4(), seed, options);
            let human = join_human(&mut session);

            session.start_round(30);
            let holder = session.round.holder().unwrap();
            assert_ne!(holder, human);
        }
    }

    #[test]
    fn second_bot_toggle_adds_and_removes() {
        let mut session = new_session(SessionOptions::default());
        assert_eq!(session.bots.len(), 1);

        session.set_second_bot(true);
        assert_eq!(session.bots.len(), 2);

        // Toggling on twice never duplicates
        session.set_second_bot(true);
        assert_eq!(session.bots.len(), 2);

        session.set_second_bot(false);
        assert_eq!(session.bots.len(), 1);

        // Ticking right after a mid-session toggle must not panic
        session.run_tick(DT);
    }

    #[test]
    fn tick_advances_round_timer_once_per_second() {
        let mut session = new_session(SessionOptions::default());
        join_human(&mut session);
        session.start_round(10);

        // One second of simulation at 30 TPS (one spare tick for float
        // accumulation)
        for _ in 0..31 {
            session.run_tick(DT);
        }
        assert_eq!(session.round.time_remaining(), 9);

        // Nine more seconds end the round
        for _ in 0..(9 * 30 + 9) {
            session.run_tick(DT);
        }
        assert!(!session.round.is_active());
        assert_eq!(session.round.time_remaining(), 0);
    }

    #[test]
    fn chasing_bot_closes_distance_and_tags() {
        let options = SessionOptions {
            force_bot_it: true,
            // Open field so the chase line is unobstructed
            arena: ArenaConfig {
                obstacle_count: 0,
                ..ArenaConfig::default()
            },
            ..SessionOptions::default()
        };
        let (mut session, _) = GameSession::new(Uuid::new_v4(), 5, options);
        let human = join_human(&mut session);
        session.start_round(60);

        let bot = *session.bots.keys().next().unwrap();
        assert_eq!(session.round.holder(), Some(bot));

        // Park the human away from the bot and keep it still
        if let Some(e) = session.entities.get_mut(&human) {
            e.pose = Pose::on_ground(10.0, 0.0, 0.0);
        }
        if let Some(e) = session.entities.get_mut(&bot) {
            e.pose = Pose::on_ground(0.0, 0.0, 0.0);
        }

        let start_gap = 10.0;
        for _ in 0..30 {
            session.run_tick(DT);
        }
        let gap = session.entities[&bot]
            .pose
            .distance(&session.entities[&human].pose);
        assert!(gap < start_gap, "chaser should close the distance");

        // Let the chase run to the tag
        for _ in 0..(30 * 20) {
            session.run_tick(DT);
            if session.round.holder() == Some(human) {
                break;
            }
        }
        assert_eq!(session.round.holder(), Some(human));
        assert!(session
            .pending_events
            .iter()
            .any(|e| matches!(e, GameEvent::Tag { .. })));
    }

    #[test]
    fn remote_entities_skip_local_integration() {
        let mut session = new_session(SessionOptions::default());
        let human = Uuid::new_v4();
        session.handle_join(human, None, true);

        let reported = Pose::new(3.0, 0.0, 4.0, 1.0);
        session.handle_pose_report(human, reported.x, reported.y, reported.z, reported.yaw);
        assert_eq!(session.entities[&human].pose, reported);

        // A poisoned report is rejected at the boundary
        session.handle_pose_report(human, f32::NAN, 0.0, 0.0, 0.0);
        assert_eq!(session.entities[&human].pose, reported);

        // Local integration leaves the reported pose alone
        session.run_tick(DT);
        assert_eq!(session.entities[&human].pose, reported);
    }

    #[test]
    fn channel_inputs_drive_the_session() {
        let (mut session, handle) = GameSession::new(Uuid::new_v4(), 7, SessionOptions::default());
        let id = Uuid::new_v4();

        handle
            .input_tx
            .try_send(SessionInput {
                entity_id: id,
                msg: ClientMsg::Join {
                    display_name: Some("p1".to_string()),
                    remote: false,
                },
                received_at: unix_millis(),
            })
            .unwrap();
        handle
            .input_tx
            .try_send(SessionInput {
                entity_id: id,
                msg: ClientMsg::IntentTick {
                    seq: 1,
                    move_x: 0.0,
                    move_z: 1.0,
                    sprint: false,
                    jump: false,
                    thrust: false,
                    rcs: false,
                    rcs_lift: 0,
                    thrust_tap: false,
                    auto_run: false,
                    yaw: 0.0,
                },
                received_at: unix_millis(),
            })
            .unwrap();

        session.process_inputs();
        assert!(session.entities.contains_key(&id));
        assert_eq!(session.entities[&id].last_input_seq, 1);

        session.run_tick(DT);
        let physics = &session.entities[&id].physics;
        let speed = (physics.vel_x * physics.vel_x + physics.vel_z * physics.vel_z).sqrt();
        assert!(speed > 0.0, "intent from the channel should move the avatar");
    }

    #[test]
    fn stale_intent_frames_are_discarded() {
        let mut session = new_session(SessionOptions::default());
        let human = join_human(&mut session);

        session.handle_intent(
            human,
            IntentFrame {
                seq: 5,
                move_z: 1.0,
                ..IntentFrame::default()
            },
        );
        session.handle_intent(
            human,
            IntentFrame {
                seq: 3,
                move_z: -1.0,
                ..IntentFrame::default()
            },
        );

        assert_eq!(session.entities[&human].last_input_seq, 5);
        assert_eq!(session.entities[&human].current_intent.move_z, 1.0);
    }

    #[test]
    fn frozen_human_produces_no_movement() {
        let mut session = new_session(SessionOptions::default());
        let human = join_human(&mut session);
        session.start_round(60);

        // Make the human frozen by tagging it
        let holder = session.round.holder().unwrap();
        if holder != human {
            session.round.record_tag(holder, human, unix_millis());
        } else {
            // Holder is the human: flip to the bot first, then back
            let bot = *session.bots.keys().next().unwrap();
            session.round.record_tag(human, bot, 0);
            session.round.record_tag(bot, human, unix_millis());
        }
        assert!(session.round.is_frozen(human, unix_millis()));

        let before = session.entities[&human].pose;
        if let Some(e) = session.entities.get_mut(&human) {
            e.current_intent = IntentFrame {
                move_z: 1.0,
                seq: 1,
                ..IntentFrame::default()
            };
        }

        // Move the bot far away so push-back cannot shift the human
        let bot = *session.bots.keys().next().unwrap();
        if let Some(e) = session.entities.get_mut(&bot) {
            e.pose = Pose::on_ground(30.0, 30.0, 0.0);
        }

        session.run_tick(DT);
        let after = session.entities[&human].pose;
        assert!(before.distance(&after) < 1e-5);
    }
}

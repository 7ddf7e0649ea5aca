//! Autonomous opponent decision logic - chase, flee, sprint bursts

use uuid::Uuid;

use crate::game::{IntentFrame, Pose};

/// Bot behavior tuning
#[derive(Debug, Clone, Copy)]
pub struct BotProfile {
    /// Distance inside which a fleeing bot reacts to the chaser
    pub chase_radius: f32,
    /// Flee speed factor below nominal; the chaser is meant to close the
    /// gap (intentional game balance, not a defect)
    pub flee_discount: f32,
    /// Sprint burst duration, seconds
    pub sprint_burst_secs: f32,
    /// Cooldown before the next burst is eligible, seconds
    pub sprint_cooldown_secs: f32,
    /// Minimum spacing between tag requests from this bot
    pub tag_request_cooldown_ms: u64,
}

impl Default for BotProfile {
    fn default() -> Self {
        Self {
            chase_radius: 12.0,
            flee_discount: 0.8,
            sprint_burst_secs: 1.4,
            sprint_cooldown_secs: 3.5,
            tag_request_cooldown_ms: 2_500,
        }
    }
}

/// Self-timed sprint cycle: a fixed cooldown, then a fixed burst, looping.
/// Not player-controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SprintPhase {
    Cooling,
    Bursting,
}

#[derive(Debug)]
struct SprintCycle {
    phase: SprintPhase,
    timer: f32,
}

impl SprintCycle {
    fn new(profile: &BotProfile) -> Self {
        Self {
            phase: SprintPhase::Cooling,
            timer: profile.sprint_cooldown_secs,
        }
    }

    /// Advance the cycle; returns whether the bot is bursting this tick
    fn advance(&mut self, dt: f32, profile: &BotProfile) -> bool {
        self.timer -= dt;
        if self.timer <= 0.0 {
            match self.phase {
                SprintPhase::Cooling => {
                    self.phase = SprintPhase::Bursting;
                    self.timer = profile.sprint_burst_secs;
                }
                SprintPhase::Bursting => {
                    self.phase = SprintPhase::Cooling;
                    self.timer = profile.sprint_cooldown_secs;
                }
            }
        }
        self.phase == SprintPhase::Bursting
    }
}

/// What the bot can see this tick
#[derive(Debug, Clone, Copy)]
pub struct BotView<'a> {
    pub me: &'a Pose,
    /// The opposing entity and its pose, if one exists
    pub target: Option<(Uuid, &'a Pose)>,
    /// This bot currently holds "it"
    pub is_it: bool,
    /// The target currently holds "it"
    pub target_is_it: bool,
    pub round_active: bool,
    pub frozen: bool,
}

/// Decision output. Tagging is requested, never applied directly; the
/// evaluator holds the authority.
#[derive(Debug, Clone, Copy)]
pub struct BotDecision {
    pub intent: IntentFrame,
    pub tag_request: Option<Uuid>,
}

impl BotDecision {
    fn idle(yaw: f32) -> Self {
        Self {
            intent: IntentFrame::idle(yaw),
            tag_request: None,
        }
    }
}

/// One agent per autonomous entity
#[derive(Debug)]
pub struct BotAgent {
    pub id: Uuid,
    profile: BotProfile,
    sprint: SprintCycle,
    last_tag_request_ms: u64,
}

impl BotAgent {
    pub fn new(id: Uuid) -> Self {
        Self::with_profile(id, BotProfile::default())
    }

    pub fn with_profile(id: Uuid, profile: BotProfile) -> Self {
        Self {
            id,
            profile,
            sprint: SprintCycle::new(&profile),
            last_tag_request_ms: 0,
        }
    }

    /// Produce this tick's movement intent. The result still flows through
    /// the shared integrator and collision resolver like any other entity.
    pub fn decide(&mut self, view: &BotView, tag_distance: f32, dt: f32, now_ms: u64) -> BotDecision {
        // Frozen: movement fully suppressed until the window elapses
        if view.frozen {
            return BotDecision::idle(view.me.yaw);
        }

        let Some((target_id, target_pose)) = view.target else {
            return BotDecision::idle(view.me.yaw);
        };

        if !view.round_active {
            return BotDecision::idle(view.me.yaw);
        }

        if view.is_it {
            self.chase(target_id, target_pose, view, tag_distance, dt, now_ms)
        } else if view.target_is_it {
            self.flee(target_pose, view)
        } else {
            BotDecision::idle(view.me.yaw)
        }
    }

    fn chase(
        &mut self,
        target_id: Uuid,
        target_pose: &Pose,
        view: &BotView,
        tag_distance: f32,
        dt: f32,
        now_ms: u64,
    ) -> BotDecision {
        let sprinting = self.sprint.advance(dt, &self.profile);
        let distance = view.me.horizontal_distance(target_pose);
        let yaw = face_towards(view.me, target_pose).unwrap_or(view.me.yaw);

        if distance >= tag_distance {
            return BotDecision {
                intent: IntentFrame {
                    move_z: 1.0,
                    sprint: sprinting,
                    yaw,
                    ..IntentFrame::default()
                },
                tag_request: None,
            };
        }

        // In range: stand and request the tag once the cooldown allows
        let mut decision = BotDecision::idle(yaw);
        if now_ms.saturating_sub(self.last_tag_request_ms) >= self.profile.tag_request_cooldown_ms
            || self.last_tag_request_ms == 0
        {
            self.last_tag_request_ms = now_ms;
            decision.tag_request = Some(target_id);
        }
        decision
    }

    fn flee(&mut self, target_pose: &Pose, view: &BotView) -> BotDecision {
        let distance = view.me.horizontal_distance(target_pose);
        if distance >= self.profile.chase_radius {
            // Out of danger: idle
            return BotDecision::idle(view.me.yaw);
        }

        let yaw = face_towards(target_pose, view.me).unwrap_or(view.me.yaw);
        BotDecision {
            intent: IntentFrame {
                // Discounted flee speed keeps the chase winnable
                move_z: self.profile.flee_discount,
                yaw,
                ..IntentFrame::default()
            },
            tag_request: None,
        }
    }
}

/// Yaw that points from `from` toward `to` on the ground plane, matching
/// the integrator's forward = (sin yaw, cos yaw) convention
fn face_towards(from: &Pose, to: &Pose) -> Option<f32> {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    if dx == 0.0 && dz == 0.0 {
        return None;
    }
    Some(dx.atan2(dz))
}

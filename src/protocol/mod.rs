//! Collaborator protocol message definitions
//! These are the contract types between the simulation core and its
//! collaborators (input capture, renderer, network layer, audio).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Game modes known to the round state machine.
/// Only `None` and `Tag` are exercised by the tag core; the rest are
/// reserved slots for other rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    None,
    Tag,
    Collectible,
    Race,
    Solo,
}

impl Default for GameMode {
    fn default() -> Self {
        Self::None
    }
}

/// Messages sent from collaborators to the simulation core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Register the human avatar with the session
    Join {
        /// Optional display name, otherwise derived from the entity id
        display_name: Option<String>,
        /// Pose is simulated remotely (peer reports) instead of locally
        remote: bool,
    },

    /// Abstracted input intent for the current tick
    IntentTick {
        /// Sequence number, stale frames are discarded
        seq: u32,
        /// Strafe axis (-1.0 = left, 1.0 = right)
        move_x: f32,
        /// Forward axis (-1.0 = back, 1.0 = forward)
        move_z: f32,
        /// Sprint key held
        sprint: bool,
        /// Jump requested this frame
        jump: bool,
        /// Thrust-mode trigger held
        thrust: bool,
        /// Micro-thruster modifier held
        rcs: bool,
        /// Micro-thruster vertical input (-1 = down, 0, 1 = up)
        rcs_lift: i8,
        /// External double-tap signal that arms thrust-mode
        thrust_tap: bool,
        /// Both-mouse-buttons auto-run, stacks with move_z
        auto_run: bool,
        /// Facing yaw from the camera, radians
        yaw: f32,
    },

    /// Position report for a remotely simulated avatar
    PoseReport {
        x: f32,
        y: f32,
        z: f32,
        yaw: f32,
    },

    /// Begin a tag round
    StartRound {
        duration_secs: u32,
    },

    /// End the current round early
    EndRound,

    /// Debug toggle: add or remove the second autonomous opponent
    SetSecondBot {
        enabled: bool,
    },

    /// Ping for latency measurement
    Ping {
        t: u64,
    },

    /// Leave the session
    Leave,
}

/// Messages published by the simulation core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Confirmation of session join
    SessionJoined {
        session_id: Uuid,
        /// Seed used for obstacle generation, so peers rebuild the same arena
        seed: u64,
        entities: Vec<EntityInfo>,
    },

    /// Entity added to the session (human join or bot toggle)
    EntityJoined {
        entity: EntityInfo,
    },

    /// Entity removed from the session
    EntityLeft {
        entity_id: Uuid,
        reason: String,
    },

    /// Pose/state snapshot (sent at regular intervals).
    /// Entities whose pose has not moved beyond the publish epsilon since
    /// the previous snapshot are omitted.
    Snapshot {
        tick: u64,
        round: RoundSnapshot,
        entities: Vec<EntitySnapshot>,
        events: Vec<GameEvent>,
    },

    /// A tag round began
    RoundStarted {
        duration_secs: u32,
        it_holder: Uuid,
    },

    /// The round ended (timer or explicit)
    RoundEnded {
        it_holder: Option<Uuid>,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        t: u64,
    },
}

/// Entity info for join notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInfo {
    pub entity_id: Uuid,
    pub display_name: String,
    /// True for autonomous opponents
    pub is_bot: bool,
}

/// Round state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub mode: GameMode,
    pub is_active: bool,
    /// Seconds remaining, integer countdown
    pub time_remaining: u32,
    pub it_holder: Option<Uuid>,
}

/// Entity state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: Uuid,
    /// Position (y is vertical)
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Facing yaw in radians
    pub yaw: f32,
    /// Velocity for animation blending
    pub vel_x: f32,
    pub vel_y: f32,
    pub vel_z: f32,
    /// Render the thruster flame (airborne with lift or RCS burning)
    pub thrust_flame: bool,
    /// Render the landing dust burst
    pub landing_dust: bool,
    /// Entity is "it" in the active round
    pub is_it: bool,
    /// Entity is inside a freeze window
    pub frozen: bool,
    pub last_input_seq: u32,
}

/// Discrete game events (audio / effects / network forwarding)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Grounded stride marker
    Footstep {
        entity_id: Uuid,
    },

    /// Jump impulse applied
    Jump {
        entity_id: Uuid,
    },

    /// Entity returned to the ground plane
    Land {
        entity_id: Uuid,
        /// Downward speed at the instant of impact
        impact_speed: f32,
    },

    /// Thrust-mode lift started
    ThrustStart {
        entity_id: Uuid,
    },

    /// Thrust-mode lift ended
    ThrustStop {
        entity_id: Uuid,
    },

    /// Micro-thruster burn this tick
    ThrusterBurst {
        entity_id: Uuid,
    },

    /// A tag landed; the "it" role moved from tagger to tagged
    Tag {
        tagger_id: Uuid,
        tagged_id: Uuid,
    },
}

/// Arena half-extent accepted from remote pose reports, with slack for
/// airborne excursions.
pub const REPORT_BOUND: f32 = 512.0;

/// Boundary check for remote pose reports.
///
/// Reports with non-finite or out-of-range components are rejected here,
/// before they reach the simulation; the core never sees them.
pub fn validate_pose_report(x: f32, y: f32, z: f32, yaw: f32) -> bool {
    let finite = x.is_finite() && y.is_finite() && z.is_finite() && yaw.is_finite();
    if !finite {
        return false;
    }
    x.abs() <= REPORT_BOUND && z.abs() <= REPORT_BOUND && (-1.0..=REPORT_BOUND).contains(&y)
}

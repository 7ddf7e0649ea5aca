//! Avatar movement physics - gravity, jumping, thrust-mode, micro-thrusters

use crate::game::arena::ArenaGeometry;
use crate::game::collision::CollisionResolver;
use crate::game::{IntentFrame, Pose};

/// Movement tuning shared by every avatar
#[derive(Debug, Clone, Copy)]
pub struct MoveStats {
    /// Base horizontal speed
    pub walk_speed: f32,
    /// Horizontal speed with sprint held
    pub sprint_speed: f32,
    /// Fixed reduced speed while thrust-mode is active (overrides sprint)
    pub thrust_move_speed: f32,
    /// Upward impulse applied on jump
    pub jump_velocity: f32,
    /// Downward acceleration while airborne
    pub gravity: f32,
    /// Per-tick vertical damping while airborne
    pub air_damping: f32,
    /// Per-tick decay of takeoff momentum
    pub momentum_keep: f32,
    /// Fraction of ground control available in the air
    pub air_control: f32,
    /// Upward acceleration from thrust-mode at full multiplier
    pub thrust_lift: f32,
    /// Max accumulated thrust hold per flight
    pub thrust_max_hold: f32,
    /// Window after a jump during which the double-tap arms thrust-mode
    pub thrust_arm_window_ms: u64,
    /// Horizontal micro-thruster acceleration
    pub rcs_accel: f32,
    /// Vertical micro-thruster acceleration
    pub rcs_lift: f32,
    /// Micro-thruster fuel in seconds, refilled on landing
    pub rcs_fuel: f32,
    /// Grounded travel distance between footstep events
    pub stride_length: f32,
}

impl MoveStats {
    pub fn standard() -> Self {
        Self {
            walk_speed: 6.0,
            sprint_speed: 9.5,
            thrust_move_speed: 4.5,
            jump_velocity: 8.5,
            gravity: -22.0,
            air_damping: 0.995,
            momentum_keep: 0.985,
            air_control: 0.35,
            thrust_lift: 26.0,
            thrust_max_hold: 1.2,
            thrust_arm_window_ms: 400,
            rcs_accel: 10.0,
            rcs_lift: 6.0,
            rcs_fuel: 3.0,
            stride_length: 2.2,
        }
    }
}

/// Per-entity physics scratch state
#[derive(Debug, Clone)]
pub struct PhysicsState {
    /// Horizontal velocity committed last tick (for animation)
    pub vel_x: f32,
    pub vel_z: f32,
    /// Vertical velocity, negative is falling
    pub vertical_velocity: f32,
    pub airborne: bool,
    /// Horizontal momentum captured at takeoff
    pub momentum_x: f32,
    pub momentum_z: f32,
    /// Thrust-mode lift currently engaged
    pub thrust_active: bool,
    /// Seconds of lift consumed this flight
    pub thrust_hold: f32,
    /// Micro-thruster fuel remaining, seconds
    pub rcs_fuel: f32,
    /// Micro-thrusters fired this tick (for the flame flag)
    pub rcs_burning: bool,
    /// When the last jump impulse was applied
    pub last_jump_ms: u64,
    /// When the most recent landing happened
    pub landed_at_ms: u64,
    stride_acc: f32,
}

impl PhysicsState {
    pub fn new(stats: &MoveStats) -> Self {
        Self {
            vel_x: 0.0,
            vel_z: 0.0,
            vertical_velocity: 0.0,
            airborne: false,
            momentum_x: 0.0,
            momentum_z: 0.0,
            thrust_active: false,
            thrust_hold: 0.0,
            rcs_fuel: stats.rcs_fuel,
            rcs_burning: false,
            last_jump_ms: 0,
            landed_at_ms: 0,
            stride_acc: 0.0,
        }
    }

    /// The renderer draws the thruster flame while lift or RCS is burning
    pub fn thrust_flame(&self) -> bool {
        self.thrust_active || self.rcs_burning
    }
}

/// Discrete physics events for the audio/effects collaborators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionEvent {
    Jumped,
    Landed { impact_speed: f32 },
    ThrustStarted,
    ThrustStopped,
    ThrusterBurst,
    Footstep,
}

/// Integrates one entity's movement for one tick
pub struct MovementIntegrator;

impl MovementIntegrator {
    /// Advance physics by `dt` seconds and return the collision-resolved
    /// pose. The candidate pose is always routed through the resolver; pose
    /// components are never committed unresolved.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        pose: &Pose,
        physics: &mut PhysicsState,
        intent: &IntentFrame,
        stats: &MoveStats,
        geometry: &ArenaGeometry,
        dt: f32,
        now_ms: u64,
        events: &mut Vec<MotionEvent>,
    ) -> Pose {
        let intent = intent.sanitized();
        let dt = if dt.is_finite() && dt > 0.0 {
            dt.min(0.25)
        } else {
            return *pose;
        };

        physics.rcs_burning = false;

        // Local intent rotated into world space by facing yaw
        let (sin, cos) = intent.yaw.sin_cos();
        let world_x = intent.move_x * cos + intent.move_z * sin;
        let world_z = -intent.move_x * sin + intent.move_z * cos;

        let speed = if physics.thrust_active {
            stats.thrust_move_speed
        } else if intent.sprint {
            stats.sprint_speed
        } else {
            stats.walk_speed
        };

        if !physics.airborne {
            physics.vel_x = world_x * speed;
            physics.vel_z = world_z * speed;
            physics.vertical_velocity = 0.0;

            Self::accumulate_stride(physics, stats, dt, events);

            if intent.jump {
                physics.vertical_velocity = stats.jump_velocity;
                physics.airborne = true;
                physics.momentum_x = physics.vel_x;
                physics.momentum_z = physics.vel_z;
                physics.last_jump_ms = now_ms;
                events.push(MotionEvent::Jumped);
            }
        }

        if physics.airborne {
            Self::apply_thrust_mode(physics, &intent, stats, dt, now_ms, events);
            Self::apply_micro_thrusters(physics, &intent, stats, world_x, world_z, dt, events);

            // Gravity, then per-tick air resistance
            physics.vertical_velocity += stats.gravity * dt;
            physics.vertical_velocity *= stats.air_damping;

            // Takeoff momentum decays and blends with reduced air control
            physics.momentum_x *= stats.momentum_keep;
            physics.momentum_z *= stats.momentum_keep;
            physics.vel_x = physics.momentum_x + world_x * speed * stats.air_control;
            physics.vel_z = physics.momentum_z + world_z * speed * stats.air_control;
        }

        let mut desired = Pose::new(
            pose.x + physics.vel_x * dt,
            pose.y + physics.vertical_velocity * dt,
            pose.z + physics.vel_z * dt,
            intent.yaw,
        );

        // Landing: the instant the vertical position crosses the ground
        // plane from above
        if physics.airborne && desired.y <= 0.0 && physics.vertical_velocity <= 0.0 {
            desired.y = 0.0;
            Self::land(physics, stats, now_ms, events);
        }

        CollisionResolver::resolve(pose, desired, geometry)
    }

    fn apply_thrust_mode(
        physics: &mut PhysicsState,
        intent: &IntentFrame,
        stats: &MoveStats,
        dt: f32,
        now_ms: u64,
        events: &mut Vec<MotionEvent>,
    ) {
        // The double-tap only arms thrust shortly after the jump impulse
        let within_window = now_ms.saturating_sub(physics.last_jump_ms) <= stats.thrust_arm_window_ms;
        if intent.thrust_tap && !physics.thrust_active && within_window {
            physics.thrust_active = true;
            events.push(MotionEvent::ThrustStarted);
        }

        if !physics.thrust_active {
            return;
        }

        if !intent.thrust || physics.thrust_hold >= stats.thrust_max_hold {
            physics.thrust_active = false;
            events.push(MotionEvent::ThrustStopped);
            return;
        }

        // Lift decays linearly from 1.0 toward 0.7 as the hold approaches
        // the max, so sustained holding yields diminishing altitude
        let progress = (physics.thrust_hold / stats.thrust_max_hold).clamp(0.0, 1.0);
        let multiplier = 1.0 - 0.3 * progress;
        physics.vertical_velocity += stats.thrust_lift * multiplier * dt;
        physics.thrust_hold += dt;
    }

    fn apply_micro_thrusters(
        physics: &mut PhysicsState,
        intent: &IntentFrame,
        stats: &MoveStats,
        world_x: f32,
        world_z: f32,
        dt: f32,
        events: &mut Vec<MotionEvent>,
    ) {
        if !intent.rcs || physics.rcs_fuel <= 0.0 {
            return;
        }

        let firing =
            intent.move_x != 0.0 || intent.move_z != 0.0 || intent.rcs_lift != 0.0;
        if !firing {
            return;
        }

        physics.rcs_fuel = (physics.rcs_fuel - dt).max(0.0);
        physics.rcs_burning = true;

        // Cardinal thrust feeds the momentum buffer, already facing-rotated
        physics.momentum_x += world_x * stats.rcs_accel * dt;
        physics.momentum_z += world_z * stats.rcs_accel * dt;
        physics.vertical_velocity += intent.rcs_lift * stats.rcs_lift * dt;

        events.push(MotionEvent::ThrusterBurst);
    }

    fn land(physics: &mut PhysicsState, stats: &MoveStats, now_ms: u64, events: &mut Vec<MotionEvent>) {
        let impact_speed = physics.vertical_velocity.abs();
        physics.landed_at_ms = now_ms;

        physics.airborne = false;
        physics.vertical_velocity = 0.0;
        physics.momentum_x = 0.0;
        physics.momentum_z = 0.0;
        physics.thrust_active = false;
        physics.thrust_hold = 0.0;
        physics.rcs_fuel = stats.rcs_fuel;
        physics.rcs_burning = false;

        events.push(MotionEvent::Landed { impact_speed });
    }

    fn accumulate_stride(
        physics: &mut PhysicsState,
        stats: &MoveStats,
        dt: f32,
        events: &mut Vec<MotionEvent>,
    ) {
        let ground_speed = (physics.vel_x * physics.vel_x + physics.vel_z * physics.vel_z).sqrt();
        if ground_speed < 0.1 {
            physics.stride_acc = 0.0;
            return;
        }

        physics.stride_acc += ground_speed * dt;
        if physics.stride_acc >= stats.stride_length {
            physics.stride_acc -= stats.stride_length;
            events.push(MotionEvent::Footstep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 30.0;
    const TICK_MS: u64 = 33;

    fn setup() -> (Pose, PhysicsState, MoveStats, ArenaGeometry) {
        let stats = MoveStats::standard();
        (
            Pose::on_ground(0.0, 0.0, 0.0),
            PhysicsState::new(&stats),
            stats,
            ArenaGeometry::open(100.0),
        )
    }

    fn step_n(
        n: usize,
        pose: &mut Pose,
        physics: &mut PhysicsState,
        intent: &IntentFrame,
        stats: &MoveStats,
        arena: &ArenaGeometry,
        now_ms: &mut u64,
    ) -> Vec<MotionEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            *pose = MovementIntegrator::step(
                pose, physics, intent, stats, arena, DT, *now_ms, &mut events,
            );
            *now_ms += TICK_MS;
        }
        events
    }

    #[test]
    fn rest_is_idempotent() {
        let (mut pose, mut physics, stats, arena) = setup();
        let idle = IntentFrame::idle(0.0);
        let mut now = 0;

        step_n(200, &mut pose, &mut physics, &idle, &stats, &arena, &mut now);

        assert_eq!(pose.x, 0.0);
        assert_eq!(pose.y, 0.0);
        assert_eq!(pose.z, 0.0);
        assert!(!physics.airborne);
    }

    #[test]
    fn jump_returns_to_ground_and_resets() {
        let (mut pose, mut physics, stats, arena) = setup();
        let mut now = 0;

        let jump = IntentFrame {
            jump: true,
            ..IntentFrame::default()
        };
        let mut events = step_n(1, &mut pose, &mut physics, &jump, &stats, &arena, &mut now);
        assert!(events.contains(&MotionEvent::Jumped));
        assert!(physics.airborne);

        // Full flight under zero intent
        let idle = IntentFrame::idle(0.0);
        events = step_n(120, &mut pose, &mut physics, &idle, &stats, &arena, &mut now);

        assert_eq!(pose.y, 0.0);
        assert!(!physics.airborne);
        assert_eq!(physics.vertical_velocity, 0.0);
        assert_eq!(physics.momentum_x, 0.0);
        assert!(events
            .iter()
            .any(|e| matches!(e, MotionEvent::Landed { impact_speed } if *impact_speed > 0.0)));
    }

    /// Fly with the thrust trigger held for `hold_ticks` and return the peak
    /// altitude reached.
    fn peak_altitude_with_hold(hold_ticks: usize) -> f32 {
        let (mut pose, mut physics, stats, arena) = setup();
        let mut now = 0;
        let mut events = Vec::new();

        // Jump, then double-tap inside the arm window
        let jump = IntentFrame {
            jump: true,
            ..IntentFrame::default()
        };
        pose = MovementIntegrator::step(
            &pose, &mut physics, &jump, &stats, &arena, DT, now, &mut events,
        );
        now += TICK_MS;

        let thrusting = IntentFrame {
            thrust: true,
            thrust_tap: true,
            ..IntentFrame::default()
        };
        let idle = IntentFrame::idle(0.0);

        let mut peak = pose.y;
        for tick in 0..240 {
            let intent = if tick < hold_ticks { thrusting } else { idle };
            pose = MovementIntegrator::step(
                &pose, &mut physics, &intent, &stats, &arena, DT, now, &mut events,
            );
            now += TICK_MS;
            peak = peak.max(pose.y);
            if !physics.airborne && tick > 0 {
                break;
            }
        }
        peak
    }

    #[test]
    fn thrust_altitude_is_bounded_past_max_hold() {
        let stats = MoveStats::standard();
        let max_hold_ticks = (stats.thrust_max_hold / DT).ceil() as usize;

        let at_max = peak_altitude_with_hold(max_hold_ticks);
        let far_past_max = peak_altitude_with_hold(max_hold_ticks * 3);

        assert!(at_max > 1.0, "thrust should produce real altitude");
        assert!(
            (far_past_max - at_max).abs() < 1e-3,
            "holding past max hold must add no lift: {far_past_max} vs {at_max}"
        );
    }

    #[test]
    fn thrust_tap_outside_window_is_ignored() {
        let (mut pose, mut physics, stats, arena) = setup();
        let mut now = 0;

        let jump = IntentFrame {
            jump: true,
            ..IntentFrame::default()
        };
        step_n(1, &mut pose, &mut physics, &jump, &stats, &arena, &mut now);

        // Wait out the arm window before tapping
        let idle = IntentFrame::idle(0.0);
        now += stats.thrust_arm_window_ms + 100;
        step_n(1, &mut pose, &mut physics, &idle, &stats, &arena, &mut now);

        let late_tap = IntentFrame {
            thrust: true,
            thrust_tap: true,
            ..IntentFrame::default()
        };
        step_n(1, &mut pose, &mut physics, &late_tap, &stats, &arena, &mut now);

        assert!(!physics.thrust_active);
    }

    #[test]
    fn rcs_burns_fuel_and_refills_on_landing() {
        let (mut pose, mut physics, stats, arena) = setup();
        let mut now = 0;

        let jump = IntentFrame {
            jump: true,
            ..IntentFrame::default()
        };
        step_n(1, &mut pose, &mut physics, &jump, &stats, &arena, &mut now);

        let rcs = IntentFrame {
            rcs: true,
            move_z: 1.0,
            ..IntentFrame::default()
        };
        let events = step_n(5, &mut pose, &mut physics, &rcs, &stats, &arena, &mut now);

        assert!(physics.rcs_fuel < stats.rcs_fuel);
        assert!(events.contains(&MotionEvent::ThrusterBurst));

        // Ride the flight down; fuel refills the moment we land
        let idle = IntentFrame::idle(0.0);
        step_n(200, &mut pose, &mut physics, &idle, &stats, &arena, &mut now);
        assert!(!physics.airborne);
        assert_eq!(physics.rcs_fuel, stats.rcs_fuel);
    }

    #[test]
    fn sprint_covers_more_ground_than_walk() {
        let arena = ArenaGeometry::open(200.0);
        let stats = MoveStats::standard();
        let mut now = 0;

        let mut walk_pose = Pose::on_ground(0.0, 0.0, 0.0);
        let mut walk_phys = PhysicsState::new(&stats);
        let walk = IntentFrame {
            move_z: 1.0,
            ..IntentFrame::default()
        };
        step_n(30, &mut walk_pose, &mut walk_phys, &walk, &stats, &arena, &mut now);

        let mut sprint_pose = Pose::on_ground(0.0, 0.0, 0.0);
        let mut sprint_phys = PhysicsState::new(&stats);
        let sprint = IntentFrame {
            move_z: 1.0,
            sprint: true,
            ..IntentFrame::default()
        };
        step_n(30, &mut sprint_pose, &mut sprint_phys, &sprint, &stats, &arena, &mut now);

        assert!(sprint_pose.z > walk_pose.z);
    }

    #[test]
    fn nan_intent_moves_nothing() {
        let (mut pose, mut physics, stats, arena) = setup();
        let mut now = 0;

        let poisoned = IntentFrame {
            move_x: f32::NAN,
            move_z: f32::INFINITY,
            ..IntentFrame::default()
        };
        step_n(10, &mut pose, &mut physics, &poisoned, &stats, &arena, &mut now);

        // Both poisoned axes clamp to zero instead of corrupting the pose
        assert!(pose.is_finite());
        assert_eq!(pose.x, 0.0);
        assert_eq!(pose.z, 0.0);
    }

    #[test]
    fn footsteps_fire_while_walking() {
        let (mut pose, mut physics, stats, arena) = setup();
        let mut now = 0;

        let walk = IntentFrame {
            move_z: 1.0,
            ..IntentFrame::default()
        };
        let events = step_n(60, &mut pose, &mut physics, &walk, &stats, &arena, &mut now);

        let steps = events
            .iter()
            .filter(|e| matches!(e, MotionEvent::Footstep))
            .count();
        assert!(steps >= 2);
    }
}

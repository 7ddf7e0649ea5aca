//! Game simulation modules

pub mod arena;
pub mod bot;
pub mod collision;
pub mod evaluator;
pub mod movement;
pub mod session;
pub mod snapshot;
pub mod tag;

pub use session::{EntityKind, GameSession, SessionHandle, SessionRegistry};

use crate::protocol::ClientMsg;
use uuid::Uuid;

/// Collaborator input received on the session channel
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub entity_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}

/// Position and facing for one entity. `y` is the vertical axis; the ground
/// plane sits at `y == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Facing yaw in radians
    pub yaw: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, z: f32, yaw: f32) -> Self {
        Self { x, y, z, yaw }
    }

    /// Spawn pose on the ground plane
    pub fn on_ground(x: f32, z: f32, yaw: f32) -> Self {
        Self::new(x, 0.0, z, yaw)
    }

    /// Full 3D distance to another pose
    pub fn distance(&self, other: &Pose) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance projected onto the ground plane
    pub fn horizontal_distance(&self, other: &Pose) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.yaw.is_finite()
    }
}

/// Input intent for a single simulation tick, already abstracted away from
/// raw devices by the input collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentFrame {
    pub seq: u32,
    /// Strafe axis, -1..1
    pub move_x: f32,
    /// Forward axis, -1..1
    pub move_z: f32,
    pub sprint: bool,
    pub jump: bool,
    /// Thrust-mode trigger held
    pub thrust: bool,
    /// Micro-thruster modifier held
    pub rcs: bool,
    /// Micro-thruster vertical input, -1..1
    pub rcs_lift: f32,
    /// Double-tap signal that arms thrust-mode
    pub thrust_tap: bool,
    /// Facing yaw in radians
    pub yaw: f32,
}

impl IntentFrame {
    /// A no-input frame that keeps the given facing
    pub fn idle(yaw: f32) -> Self {
        Self {
            yaw,
            ..Self::default()
        }
    }

    /// Clamp axes into range and zero out non-finite components.
    ///
    /// NaN or infinite input corrupts every downstream integration step, so
    /// it is recovered here rather than propagated.
    pub fn sanitized(mut self) -> Self {
        self.move_x = clamp_axis(self.move_x);
        self.move_z = clamp_axis(self.move_z);
        self.rcs_lift = clamp_axis(self.rcs_lift);
        if !self.yaw.is_finite() {
            self.yaw = 0.0;
        }
        self
    }
}

fn clamp_axis(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_nan_and_range() {
        let frame = IntentFrame {
            move_x: f32::NAN,
            move_z: 7.0,
            rcs_lift: f32::NEG_INFINITY,
            yaw: f32::NAN,
            ..IntentFrame::default()
        };

        let clean = frame.sanitized();
        assert_eq!(clean.move_x, 0.0);
        assert_eq!(clean.move_z, 1.0);
        assert_eq!(clean.rcs_lift, 0.0);
        assert_eq!(clean.yaw, 0.0);
    }

    #[test]
    fn pose_distances() {
        let a = Pose::on_ground(0.0, 0.0, 0.0);
        let b = Pose::new(3.0, 4.0, 0.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
        assert!((a.horizontal_distance(&b) - 3.0).abs() < 1e-6);
    }
}

//! Collision resolution against static geometry and entity proximity

use crate::game::arena::ArenaGeometry;
use crate::game::Pose;

/// Capsule radius used for every avatar
pub const ENTITY_RADIUS: f32 = 0.5;

/// Maximum tolerated penetration into static geometry
pub const PENETRATION_EPSILON: f32 = 0.01;

/// Stateless resolver; pure function of geometry and two poses
pub struct CollisionResolver;

impl CollisionResolver {
    /// Adjust `desired` so it respects the arena and its obstacles.
    ///
    /// Blocked movement is projected one axis at a time (keep-x, then
    /// keep-z) so entities slide along walls instead of stopping. If both
    /// projections are blocked, the horizontal position stays where it was.
    /// A non-finite desired pose falls back to the current, known-good one.
    pub fn resolve(current: &Pose, desired: Pose, geometry: &ArenaGeometry) -> Pose {
        if !desired.is_finite() {
            return *current;
        }

        let mut pose = desired;

        // Floor: nothing sinks below the ground plane
        if pose.y < 0.0 {
            pose.y = 0.0;
        }

        // Arena bounds
        let limit = geometry.half_extent - ENTITY_RADIUS;
        pose.x = pose.x.clamp(-limit, limit);
        pose.z = pose.z.clamp(-limit, limit);

        for obstacle in &geometry.obstacles {
            if !obstacle.blocks(pose.x, pose.y, pose.z, ENTITY_RADIUS) {
                continue;
            }

            let keep_x = (pose.x, current.z);
            let keep_z = (current.x, pose.z);

            if !obstacle.blocks(keep_x.0, pose.y, keep_x.1, ENTITY_RADIUS) {
                pose.z = keep_x.1;
            } else if !obstacle.blocks(keep_z.0, pose.y, keep_z.1, ENTITY_RADIUS) {
                pose.x = keep_z.0;
            } else {
                pose.x = current.x;
                pose.z = current.z;
            }
        }

        // Sliding around one obstacle may have pushed into a neighbor;
        // the previous pose is non-penetrating by induction.
        if Self::penetrates(&pose, geometry) {
            pose.x = current.x;
            pose.z = current.z;
        }

        pose
    }

    /// Sphere proximity between two entities, independent of static geometry
    pub fn entities_overlap(a: &Pose, b: &Pose, radius: f32) -> bool {
        a.distance(b) <= radius * 2.0
    }

    fn penetrates(pose: &Pose, geometry: &ArenaGeometry) -> bool {
        geometry.obstacles.iter().any(|o| {
            o.blocks(
                pose.x,
                pose.y,
                pose.z,
                ENTITY_RADIUS - PENETRATION_EPSILON,
            )
        })
    }
}

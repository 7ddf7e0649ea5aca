//! Static arena geometry - obstacle field generation

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Axis-aligned box obstacle standing on the ground plane
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    /// Footprint center
    pub x: f32,
    pub z: f32,
    /// Footprint half-extents
    pub half_x: f32,
    pub half_z: f32,
    /// Top of the box; entities above this height pass over it
    pub height: f32,
}

impl Obstacle {
    /// Whether a point at the given height is inside the footprint expanded
    /// by `radius`.
    pub fn blocks(&self, x: f32, y: f32, z: f32, radius: f32) -> bool {
        if y >= self.height {
            return false;
        }
        (x - self.x).abs() < self.half_x + radius && (z - self.z).abs() < self.half_z + radius
    }
}

/// Immutable obstacle field for one session, generated once from the seed
#[derive(Debug, Clone)]
pub struct ArenaGeometry {
    /// Arena half-extent; positions are clamped to [-half, half] on x and z
    pub half_extent: f32,
    pub obstacles: Vec<Obstacle>,
}

/// Generation parameters for the obstacle field
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub half_extent: f32,
    pub obstacle_count: usize,
    /// Obstacle-free radius around the origin so entities never spawn stuck
    pub spawn_clearing: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            half_extent: 60.0,
            obstacle_count: 24,
            spawn_clearing: 6.0,
        }
    }
}

impl ArenaGeometry {
    /// Generate the obstacle field from a session seed.
    ///
    /// Peers that share the seed rebuild an identical arena.
    pub fn generate(seed: u64, config: &ArenaConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut obstacles = Vec::with_capacity(config.obstacle_count);

        let placement_range = config.half_extent * 0.9;
        while obstacles.len() < config.obstacle_count {
            let x = rng.gen_range(-placement_range..placement_range);
            let z = rng.gen_range(-placement_range..placement_range);

            // Keep the spawn area clear
            if (x * x + z * z).sqrt() < config.spawn_clearing {
                continue;
            }

            obstacles.push(Obstacle {
                x,
                z,
                half_x: rng.gen_range(0.8..3.0),
                half_z: rng.gen_range(0.8..3.0),
                height: rng.gen_range(2.0..7.0),
            });
        }

        Self {
            half_extent: config.half_extent,
            obstacles,
        }
    }

    /// An empty arena of the given half-extent (tests and headless tools)
    pub fn open(half_extent: f32) -> Self {
        Self {
            half_extent,
            obstacles: Vec::new(),
        }
    }
}

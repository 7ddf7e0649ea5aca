//! Time utilities for game simulation

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const SNAPSHOT_TPS: u32 = 20; // 20 snapshots per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Calculate delta time for physics (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Accumulates frame deltas and releases whole seconds.
///
/// The round timer must decrement once per wall-clock second regardless of
/// frame rate, so per-frame deltas are pooled here and drained in whole
/// 1-second steps.
#[derive(Debug, Default)]
pub struct SecondAccumulator {
    acc: f32,
}

impl SecondAccumulator {
    pub fn new() -> Self {
        Self { acc: 0.0 }
    }

    /// Add a frame delta and return how many whole seconds elapsed.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !dt.is_finite() || dt < 0.0 {
            return 0;
        }
        self.acc += dt;
        let whole = self.acc.floor();
        self.acc -= whole;
        whole as u32
    }

    /// Drop any partial second (used when a round ends).
    pub fn reset(&mut self) {
        self.acc = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_releases_whole_seconds_only() {
        let mut acc = SecondAccumulator::new();

        // 29 ticks at 30 TPS: not yet a full second
        for _ in 0..29 {
            assert_eq!(acc.advance(1.0 / 30.0), 0);
        }

        // The 30th tick crosses the boundary
        assert_eq!(acc.advance(1.0 / 30.0), 1);
    }

    #[test]
    fn accumulator_handles_large_deltas() {
        let mut acc = SecondAccumulator::new();
        assert_eq!(acc.advance(2.5), 2);
        assert_eq!(acc.advance(0.5), 1);
    }

    #[test]
    fn accumulator_rejects_bad_deltas() {
        let mut acc = SecondAccumulator::new();
        assert_eq!(acc.advance(f32::NAN), 0);
        assert_eq!(acc.advance(-1.0), 0);
        assert_eq!(acc.advance(1.0), 1);
    }
}

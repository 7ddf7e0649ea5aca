//! Snapshot building and pose-delta filtering

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::{EntitySnapshot, GameEvent, RoundSnapshot, ServerMsg};

/// Pose delta below which an entity is considered unmoved and omitted from
/// the next snapshot
pub const POSE_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
struct LastSent {
    x: f32,
    y: f32,
    z: f32,
    yaw: f32,
    thrust_flame: bool,
    landing_dust: bool,
    is_it: bool,
    frozen: bool,
}

impl LastSent {
    fn of(e: &EntitySnapshot) -> Self {
        Self {
            x: e.x,
            y: e.y,
            z: e.z,
            yaw: e.yaw,
            thrust_flame: e.thrust_flame,
            landing_dust: e.landing_dust,
            is_it: e.is_it,
            frozen: e.frozen,
        }
    }

    fn differs_from(&self, e: &EntitySnapshot) -> bool {
        (self.x - e.x).abs() > POSE_EPSILON
            || (self.y - e.y).abs() > POSE_EPSILON
            || (self.z - e.z).abs() > POSE_EPSILON
            || (self.yaw - e.yaw).abs() > POSE_EPSILON
            || self.thrust_flame != e.thrust_flame
            || self.landing_dust != e.landing_dust
            || self.is_it != e.is_it
            || self.frozen != e.frozen
    }
}

/// Builds snapshots for the rendering and network collaborators
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Per-entity state as of the last published snapshot
    last_sent: HashMap<Uuid, LastSent>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            last_sent: HashMap::new(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message. Entities whose published state moved less
    /// than the epsilon since the last snapshot are omitted.
    pub fn build(
        &mut self,
        tick: u64,
        round: RoundSnapshot,
        entities: Vec<EntitySnapshot>,
        events: Vec<GameEvent>,
    ) -> ServerMsg {
        let changed: Vec<EntitySnapshot> = entities
            .into_iter()
            .filter(|e| {
                self.last_sent
                    .get(&e.entity_id)
                    .map_or(true, |last| last.differs_from(e))
            })
            .collect();

        for e in &changed {
            self.last_sent.insert(e.entity_id, LastSent::of(e));
        }

        ServerMsg::Snapshot {
            tick,
            round,
            entities: changed,
            events,
        }
    }

    /// Drop delta tracking for an entity that left
    pub fn forget(&mut self, entity_id: Uuid) {
        self.last_sent.remove(&entity_id);
    }
}

//! Per-tick tag condition evaluation

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::game::tag::TagRound;
use crate::game::Pose;
use crate::protocol::GameMode;

/// Which context initiated a candidate tag; picks the cooldown window.
/// Peer-to-peer multiplayer tags use a shorter window than single-session
/// bot tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagContext {
    Peer,
    Bot,
}

/// One actor/target pairing to evaluate this tick
#[derive(Debug, Clone, Copy)]
pub struct TagCandidate {
    pub actor: Uuid,
    pub target: Uuid,
    pub context: TagContext,
}

/// Ephemeral tag occurrence; folded into round state and forwarded to
/// collaborators, never persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagEvent {
    pub tagger: Uuid,
    pub tagged: Uuid,
    pub at_ms: u64,
}

/// Decides whether a tag condition is met and applies it through the round
/// state machine. Tracks each actor's last successful tag for cooldowns.
#[derive(Debug, Default)]
pub struct TaggingEvaluator {
    last_tag_at: HashMap<Uuid, u64>,
}

impl TaggingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate candidates against the post-movement pose snapshot.
    ///
    /// At most one tag fires per tick: evaluation returns on the first
    /// success and never walks further targets.
    pub fn evaluate(
        &mut self,
        round: &mut TagRound,
        poses: &HashMap<Uuid, Pose>,
        candidates: &[TagCandidate],
        now_ms: u64,
    ) -> Option<TagEvent> {
        if round.mode() != GameMode::Tag || !round.is_active() {
            return None;
        }

        for candidate in candidates {
            if !round.is_holder(candidate.actor) {
                continue;
            }

            let (Some(actor_pose), Some(target_pose)) =
                (poses.get(&candidate.actor), poses.get(&candidate.target))
            else {
                // Entity vanished between intent and evaluation
                debug!(actor = %candidate.actor, target = %candidate.target,
                       "tag candidate references missing entity");
                continue;
            };

            if actor_pose.distance(target_pose) > round.rules().tag_distance {
                continue;
            }

            let cooldown = match candidate.context {
                TagContext::Peer => round.rules().peer_cooldown_ms,
                TagContext::Bot => round.rules().bot_cooldown_ms,
            };
            if let Some(last) = self.last_tag_at.get(&candidate.actor) {
                if now_ms.saturating_sub(*last) < cooldown {
                    continue;
                }
            }

            if round.record_tag(candidate.actor, candidate.target, now_ms) {
                self.last_tag_at.insert(candidate.actor, now_ms);
                return Some(TagEvent {
                    tagger: candidate.actor,
                    tagged: candidate.target,
                    at_ms: now_ms,
                });
            }
        }

        None
    }

    /// Drop cooldown tracking for an entity that left the session
    pub fn forget(&mut self, entity_id: Uuid) {
        self.last_tag_at.remove(&entity_id);
    }

    /// Clear all cooldowns (new round)
    pub fn reset(&mut self) {
        self.last_tag_at.clear();
    }
}

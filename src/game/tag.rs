//! Tag round state machine - mode, "it" holder, timer, freeze windows

use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{GameMode, RoundSnapshot};

/// Fixed rule constants for the tag mode
#[derive(Debug, Clone, Copy)]
pub struct TagRules {
    /// How long a tagged entity stays frozen
    pub freeze_ms: u64,
    /// Distance at or below which a tag connects
    pub tag_distance: f32,
    /// Cooldown between successful tags, peer-to-peer multiplayer context
    pub peer_cooldown_ms: u64,
    /// Cooldown between successful tags, single-session bot context
    pub bot_cooldown_ms: u64,
}

impl Default for TagRules {
    fn default() -> Self {
        Self {
            freeze_ms: 3_000,
            tag_distance: 1.6,
            peer_cooldown_ms: 1_500,
            bot_cooldown_ms: 2_500,
        }
    }
}

/// Round lifecycle: idle (mode none) <-> active (mode tag) -> idle on
/// explicit end or timer exhaustion. Owns the holder, the countdown, and
/// the per-entity freeze windows; all round mutation funnels through here.
#[derive(Debug)]
pub struct TagRound {
    mode: GameMode,
    is_active: bool,
    time_remaining: u32,
    it_holder: Option<Uuid>,
    /// Reserved for future rule sets; tag logic never reads it
    scores: HashMap<Uuid, i64>,
    frozen_until: HashMap<Uuid, u64>,
    rules: TagRules,
}

impl TagRound {
    pub fn new(rules: TagRules) -> Self {
        Self {
            mode: GameMode::None,
            is_active: false,
            time_remaining: 0,
            it_holder: None,
            scores: HashMap::new(),
            frozen_until: HashMap::new(),
            rules,
        }
    }

    pub fn rules(&self) -> &TagRules {
        &self.rules
    }

    /// Start a tag round, picking the initial holder at random among the
    /// eligible entities. `excluded` removes the human entity from the draw
    /// while the both-bots debug configuration is enabled.
    ///
    /// Returns the chosen holder, or `None` when no entity is eligible (the
    /// round does not activate in that case).
    pub fn start_round(
        &mut self,
        duration_secs: u32,
        entities: &[Uuid],
        excluded: Option<Uuid>,
        rng: &mut impl Rng,
    ) -> Option<Uuid> {
        let eligible: Vec<Uuid> = entities
            .iter()
            .copied()
            .filter(|id| Some(*id) != excluded)
            .collect();

        if eligible.is_empty() {
            warn!("no eligible entities, round not started");
            return None;
        }

        let holder = eligible[rng.gen_range(0..eligible.len())];

        self.mode = GameMode::Tag;
        self.is_active = true;
        self.time_remaining = duration_secs;
        self.it_holder = Some(holder);
        self.frozen_until.clear();
        self.scores = entities.iter().map(|id| (*id, 0)).collect();

        info!(it_holder = %holder, duration_secs, "tag round started");
        Some(holder)
    }

    /// Decrement the countdown, clamped at zero. Returns true on the call
    /// that ends the round.
    pub fn advance_timer(&mut self, delta_secs: u32) -> bool {
        if !self.is_active {
            return false;
        }

        self.time_remaining = self.time_remaining.saturating_sub(delta_secs);
        if self.time_remaining == 0 {
            self.end_round();
            return true;
        }
        false
    }

    /// Apply a tag. Illegal calls (inactive round, wrong mode, non-holder
    /// tagger, self-tag) are silent no-ops since autonomous and remote
    /// sources may race.
    pub fn record_tag(&mut self, tagger: Uuid, tagged: Uuid, now_ms: u64) -> bool {
        if self.mode != GameMode::Tag || !self.is_active {
            debug!(%tagger, %tagged, "tag ignored, round not active");
            return false;
        }
        if self.it_holder != Some(tagger) || tagger == tagged {
            debug!(%tagger, %tagged, "tag ignored, tagger is not the holder");
            return false;
        }

        self.it_holder = Some(tagged);
        // The tagged entity freezes; the tagger never does
        self.frozen_until
            .insert(tagged, now_ms + self.rules.freeze_ms);

        info!(%tagger, %tagged, "tag recorded, holder flipped");
        true
    }

    /// Deactivate the round. The mode persists until `reset` or the next
    /// `start_round`; in-flight physics state is left to the session.
    pub fn end_round(&mut self) {
        if self.is_active {
            info!("round ended");
        }
        self.is_active = false;
        self.frozen_until.clear();
    }

    /// Return to mode none
    pub fn reset(&mut self) {
        self.end_round();
        self.mode = GameMode::None;
        self.it_holder = None;
        self.time_remaining = 0;
        self.scores.clear();
    }

    /// An entity left the session mid-round. If it held "it", hand the role
    /// to a random survivor so the active-round holder invariant stays
    /// intact; with nobody left the round ends.
    pub fn handle_entity_removed(
        &mut self,
        entity_id: Uuid,
        remaining: &[Uuid],
        rng: &mut impl Rng,
    ) {
        self.frozen_until.remove(&entity_id);
        self.scores.remove(&entity_id);

        if self.it_holder != Some(entity_id) {
            return;
        }

        if !self.is_active || remaining.is_empty() {
            self.it_holder = None;
            self.end_round();
            return;
        }

        let next = remaining[rng.gen_range(0..remaining.len())];
        self.it_holder = Some(next);
        info!(left = %entity_id, new_holder = %next, "holder left, role reassigned");
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn holder(&self) -> Option<Uuid> {
        self.it_holder
    }

    pub fn is_holder(&self, id: Uuid) -> bool {
        self.it_holder == Some(id)
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn is_frozen(&self, id: Uuid, now_ms: u64) -> bool {
        self.frozen_until
            .get(&id)
            .is_some_and(|until| *until > now_ms)
    }

    pub fn frozen_until(&self, id: Uuid) -> u64 {
        self.frozen_until.get(&id).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            mode: self.mode,
            is_active: self.is_active,
            time_remaining: self.time_remaining,
            it_holder: self.it_holder,
        }
    }
}

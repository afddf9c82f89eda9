//! World State Definitions
//!
//! The in-memory aggregate for one zone: players, cached chunks, the world
//! clock, and the unified delayed-effect scheduler. Uses BTreeMap keyed by
//! stable ids for sorted, reproducible iteration.
//!
//! One `ZoneWorld` exists per zone process; it is created at startup,
//! mutated by the tick driver and by validated inputs, and torn down with
//! the process. Chunks inside it are a cache, never durable state.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::character::{
    xp_to_next_level, Attributes, Archetype, CharacterRecord, SkillProgression,
    SKILL_POINTS_PER_LEVEL, STAT_POINTS_PER_LEVEL,
};
use crate::game::chunk::{chunk_coords_of, Chunk};
use crate::game::events::PresentationEvent;
use crate::game::items::{EquipSlot, Item};
use crate::game::mobs::{MobId, MobIdAllocator, MobInstance};
use crate::game::stats::{apply_god_mode, recalculate_stats, EffectiveStats};
use crate::TICK_INTERVAL_MS;

/// Ticks per in-game day.
pub const DAY_LENGTH_TICKS: u32 = 24_000;

/// Time-of-day at which daylight begins.
pub const DAY_START: u32 = 6_000;

/// Time-of-day at which night begins.
pub const NIGHT_START: u32 = 18_000;

/// Weather rotates every this many ticks.
pub const WEATHER_CYCLE_TICKS: u64 = 3_000;

/// HP regen fires every this many ticks.
pub const REGEN_INTERVAL_TICKS: u64 = 30;

/// Fraction of max HP restored per regen pulse (applied as ceil).
pub const REGEN_FRACTION: f32 = 0.02;

/// Maximum potion charges.
pub const POTION_MAX_CHARGES: u8 = 3;

/// Time until empty potion charges refill.
pub const POTION_REFILL_MS: u64 = 30_000;

/// Fraction of max HP restored by one potion charge.
pub const POTION_HEAL_FRACTION: f32 = 0.35;

/// Player melee reach.
pub const PLAYER_ATTACK_RANGE: f32 = 2.0;

/// Base delay between player attacks.
pub const BASE_ATTACK_COOLDOWN_MS: u64 = 600;

/// Player movement speed in world units per tick.
pub const PLAYER_MOVE_SPEED: f32 = 0.5;

// =============================================================================
// WORLD CLOCK & WEATHER
// =============================================================================

/// Weather states, cycled in a fixed rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    Rain,
    Fog,
    Storm,
}

impl Weather {
    /// Next weather in the rotation.
    pub fn next(self) -> Weather {
        match self {
            Weather::Clear => Weather::Rain,
            Weather::Rain => Weather::Fog,
            Weather::Fog => Weather::Storm,
            Weather::Storm => Weather::Clear,
        }
    }
}

/// Global clock fields for one zone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WorldClock {
    /// Monotonic tick counter
    pub tick: u64,
    /// Game time-of-day counter, modulo [`DAY_LENGTH_TICKS`]
    pub time_of_day: u32,
    /// Current weather
    pub weather: Weather,
}

impl WorldClock {
    /// Fresh clock starting at dawn.
    pub fn new() -> Self {
        Self {
            tick: 0,
            time_of_day: DAY_START,
            weather: Weather::Clear,
        }
    }

    /// Simulation time in milliseconds (tick * tick interval).
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.tick * TICK_INTERVAL_MS
    }

    /// Whether it is currently daytime.
    pub fn is_day(&self) -> bool {
        (DAY_START..NIGHT_START).contains(&self.time_of_day)
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// Potion-charge economy. The refill timestamp is set only when charges
/// hit zero and cleared again on refill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotionCharges {
    pub current: u8,
    pub max: u8,
    pub refill_due_ms: Option<u64>,
}

impl PotionCharges {
    /// Full charges, no pending refill.
    pub fn full() -> Self {
        Self {
            current: POTION_MAX_CHARGES,
            max: POTION_MAX_CHARGES,
            refill_due_ms: None,
        }
    }

    /// Consume one charge. Arms the refill timer when the last charge is
    /// spent. Returns false if no charge was available.
    pub fn consume(&mut self, now_ms: u64) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        if self.current == 0 {
            self.refill_due_ms = Some(now_ms + POTION_REFILL_MS);
        }
        true
    }

    /// Refill to max if the timer has elapsed. Returns true on refill.
    pub fn try_refill(&mut self, now_ms: u64) -> bool {
        match self.refill_due_ms {
            Some(due) if now_ms >= due => {
                self.current = self.max;
                self.refill_due_ms = None;
                true
            }
            _ => false,
        }
    }
}

/// Status flags with durations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    /// Frozen until this simulation time, if frozen
    pub frozen_until_ms: Option<u64>,
    /// Admin god-mode override
    pub god_mode: bool,
    /// Banned by an admin; the gateway disconnects banned players
    pub banned: bool,
}

/// Live state of one connected player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: Uuid,
    pub name: String,
    pub archetype: Archetype,
    pub level: u32,
    pub experience: u64,
    pub position: Vec2,
    pub respawn_point: Vec2,
    pub hp: u32,
    pub mp: u32,
    /// Base attributes (before gear)
    pub attributes: Attributes,
    /// Derived stats; recomputed whenever gear or attributes change
    pub stats: EffectiveStats,
    pub inventory: Vec<Item>,
    pub equipment: BTreeMap<EquipSlot, Item>,
    pub skills: SkillProgression,
    pub potions: PotionCharges,
    pub status: PlayerStatus,
    pub unspent_stat_points: u32,
    pub unspent_skill_points: u32,
    pub gold: u64,
    /// Timestamp of the last accepted attack (rate limiting)
    pub last_attack_ms: u64,
    pub admin: bool,
}

impl PlayerState {
    /// Build live state from a persisted character record.
    pub fn from_record(record: CharacterRecord, spawn: Vec2) -> Self {
        let stats = recalculate_stats(record.archetype, &record.attributes, &record.equipment);
        Self {
            id: record.id,
            name: record.name,
            archetype: record.archetype,
            level: record.level,
            experience: record.experience,
            position: spawn,
            respawn_point: spawn,
            hp: stats.max_hp,
            mp: stats.max_mp,
            attributes: record.attributes,
            stats,
            inventory: record.inventory,
            equipment: record.equipment,
            skills: record.skills,
            potions: PotionCharges::full(),
            status: PlayerStatus::default(),
            unspent_stat_points: record.unspent_stat_points,
            unspent_skill_points: record.unspent_skill_points,
            gold: record.gold,
            last_attack_ms: 0,
            admin: record.admin,
        }
    }

    /// Snapshot back into a persisted record (checkpoint payload).
    pub fn to_record(&self) -> CharacterRecord {
        CharacterRecord {
            id: self.id,
            name: self.name.clone(),
            archetype: self.archetype,
            level: self.level,
            experience: self.experience,
            attributes: self.attributes,
            unspent_stat_points: self.unspent_stat_points,
            unspent_skill_points: self.unspent_skill_points,
            gold: self.gold,
            inventory: self.inventory.clone(),
            equipment: self.equipment.clone(),
            skills: self.skills.clone(),
            admin: self.admin,
        }
    }

    /// Recompute derived stats from attributes and gear, re-applying the
    /// god-mode override afterwards and clamping hp/mp to the new maxima.
    pub fn recalc(&mut self) {
        self.stats = recalculate_stats(self.archetype, &self.attributes, &self.equipment);
        if self.status.god_mode {
            apply_god_mode(&mut self.stats);
        }
        self.hp = self.hp.min(self.stats.max_hp);
        self.mp = self.mp.min(self.stats.max_mp);
    }

    /// Whether the player is alive.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Whether the player is currently frozen.
    pub fn is_frozen(&self, now_ms: u64) -> bool {
        self.status.frozen_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Apply damage, clamped at zero. Returns true if this hit killed.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        let was_alive = self.is_alive();
        self.hp = self.hp.saturating_sub(amount);
        was_alive && self.hp == 0
    }

    /// Heal, clamped to max HP. Returns the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.hp;
        self.hp = (self.hp + amount).min(self.stats.max_hp);
        self.hp - before
    }

    /// Grant experience; returns the number of levels gained.
    pub fn gain_xp(&mut self, amount: u64) -> u32 {
        self.experience += amount;
        let mut gained = 0;
        while self.experience >= xp_to_next_level(self.level) {
            self.experience -= xp_to_next_level(self.level);
            self.level += 1;
            self.unspent_stat_points += STAT_POINTS_PER_LEVEL;
            self.unspent_skill_points += SKILL_POINTS_PER_LEVEL;
            gained += 1;
        }
        if gained > 0 {
            // Level-ups refill the pools
            self.recalc();
            self.hp = self.stats.max_hp;
            self.mp = self.stats.max_mp;
        }
        gained
    }
}

// =============================================================================
// DELAYED EFFECTS
// =============================================================================

/// Payload of a scheduled effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DelayedEffectKind {
    /// Telegraphed frost hazard resolving at its due time
    FrostNova {
        center: Vec2,
        radius: f32,
        damage: u32,
        freeze_ms: u64,
    },
}

/// A scheduled effect, ordered by due time then insertion sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelayedEffect {
    pub due_ms: u64,
    /// Tie-break so same-tick effects resolve in schedule order
    pub seq: u64,
    pub kind: DelayedEffectKind,
}

impl PartialEq for DelayedEffect {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl Eq for DelayedEffect {}

impl PartialOrd for DelayedEffect {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEffect {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due_ms
            .cmp(&other.due_ms)
            .then(self.seq.cmp(&other.seq))
    }
}

// =============================================================================
// ZONE WORLD
// =============================================================================

/// Complete mutable state of one zone.
pub struct ZoneWorld {
    /// Zone identifier (static configuration)
    pub zone_id: u16,
    /// Zone terrain seed
    pub seed: u64,
    /// Clock fields
    pub clock: WorldClock,
    /// RNG for spawn and loot rolls
    pub rng: DeterministicRng,
    /// Connected players by character id
    pub players: BTreeMap<Uuid, PlayerState>,
    /// Cached chunks by grid coordinates
    pub chunks: BTreeMap<(i32, i32), Chunk>,
    /// Fresh mob id source
    pub mob_ids: MobIdAllocator,
    /// Zone spawn point for new and respawning players
    pub spawn_point: Vec2,
    /// Unified delayed-effect scheduler (min-heap on due time)
    delayed: BinaryHeap<Reverse<DelayedEffect>>,
    delayed_seq: u64,
    /// Presentation events pending drain
    pending_events: Vec<PresentationEvent>,
}

impl ZoneWorld {
    /// Create a fresh zone world.
    pub fn new(zone_id: u16, seed: u64, spawn_point: Vec2) -> Self {
        Self {
            zone_id,
            seed,
            clock: WorldClock::new(),
            rng: DeterministicRng::new(seed),
            players: BTreeMap::new(),
            chunks: BTreeMap::new(),
            mob_ids: MobIdAllocator::default(),
            spawn_point,
            delayed: BinaryHeap::new(),
            delayed_seq: 0,
            pending_events: Vec::new(),
        }
    }

    /// Admit a player from their persisted record. Spawns at the zone
    /// spawn point unless a carry-over position is supplied (handover).
    pub fn add_player(&mut self, record: CharacterRecord, position: Option<Vec2>) -> Uuid {
        let spawn = position.unwrap_or(self.spawn_point);
        let player = PlayerState::from_record(record, spawn);
        let id = player.id;
        self.players.insert(id, player);
        id
    }

    /// Remove a player, returning the record to checkpoint.
    pub fn remove_player(&mut self, id: &Uuid) -> Option<CharacterRecord> {
        self.players.remove(id).map(|p| p.to_record())
    }

    /// Schedule a delayed effect.
    pub fn schedule_effect(&mut self, due_ms: u64, kind: DelayedEffectKind) {
        let seq = self.delayed_seq;
        self.delayed_seq += 1;
        self.delayed.push(Reverse(DelayedEffect { due_ms, seq, kind }));
    }

    /// Pop every effect due at or before `now_ms`, in due order.
    pub fn pop_due_effects(&mut self, now_ms: u64) -> Vec<DelayedEffect> {
        let mut due = Vec::new();
        while let Some(Reverse(effect)) = self.delayed.peek() {
            if effect.due_ms > now_ms {
                break;
            }
            due.push(self.delayed.pop().unwrap().0);
        }
        due
    }

    /// Number of effects still scheduled.
    pub fn scheduled_effect_count(&self) -> usize {
        self.delayed.len()
    }

    /// Queue a presentation event.
    pub fn push_event(&mut self, event: PresentationEvent) {
        self.pending_events.push(event);
    }

    /// Drain pending presentation events.
    pub fn take_events(&mut self) -> Vec<PresentationEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Find a live mob anywhere in the cached chunks.
    pub fn find_mob_mut(&mut self, id: MobId) -> Option<&mut MobInstance> {
        self.chunks
            .values_mut()
            .flat_map(|c| c.mobs.iter_mut())
            .find(|m| m.id == id)
    }

    /// The set of chunk keys inside any player's 3x3 neighborhood,
    /// paired with the highest level among the players requesting each.
    pub fn required_chunks(&self) -> BTreeMap<(i32, i32), u32> {
        let mut required = BTreeMap::new();
        for player in self.players.values() {
            let (cx, cy) = chunk_coords_of(player.position);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let entry = required.entry((cx + dx, cy + dy)).or_insert(0);
                    *entry = (*entry).max(player.level);
                }
            }
        }
        required
    }
}

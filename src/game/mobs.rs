//! Mob Definitions & Instances
//!
//! Static species table, tier multipliers, and live mob instances with
//! their attack-cycle state. Stats are snapshotted once at spawn from
//! (species, level, tier); the state machine itself lives in `ai.rs`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;
use crate::game::character::Attributes;
use crate::game::stats::EffectiveStats;

/// Stable in-zone mob identifier.
pub type MobId = u64;

/// Monotonic allocator for fresh mob ids.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MobIdAllocator {
    next: MobId,
}

impl MobIdAllocator {
    /// Allocate the next id.
    pub fn next_id(&mut self) -> MobId {
        let id = self.next;
        self.next += 1;
        id
    }
}

// =============================================================================
// SPECIES TABLE
// =============================================================================

/// Mob species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Boar,
    Wolf,
    Bandit,
    Skeleton,
    Ogre,
}

/// Static per-species tuning constants.
#[derive(Debug, Clone, Copy)]
pub struct MobDefinition {
    pub species: Species,
    pub name: &'static str,
    pub base_hp: u32,
    pub base_damage: u32,
    /// Pursuit speed in world units per second
    pub move_speed: f32,
    /// Distance at which the mob starts pursuing
    pub aggro_radius: f32,
    /// Distance at which the mob commits to an attack
    pub attack_range: f32,
    /// Delay from attack commit to damage application
    pub windup_ms: u64,
    /// Total attack duration including recovery
    pub attack_duration_ms: u64,
    pub xp_value: u64,
}

const DEFINITIONS: [MobDefinition; 5] = [
    MobDefinition {
        species: Species::Boar,
        name: "Tusked Boar",
        base_hp: 30,
        base_damage: 6,
        move_speed: 2.0,
        aggro_radius: 6.0,
        attack_range: 1.5,
        windup_ms: 400,
        attack_duration_ms: 1200,
        xp_value: 10,
    },
    MobDefinition {
        species: Species::Wolf,
        name: "Gray Wolf",
        base_hp: 24,
        base_damage: 8,
        move_speed: 3.2,
        aggro_radius: 8.0,
        attack_range: 1.5,
        windup_ms: 300,
        attack_duration_ms: 1000,
        xp_value: 12,
    },
    MobDefinition {
        species: Species::Bandit,
        name: "Road Bandit",
        base_hp: 40,
        base_damage: 10,
        move_speed: 2.4,
        aggro_radius: 7.0,
        attack_range: 1.8,
        windup_ms: 500,
        attack_duration_ms: 1400,
        xp_value: 18,
    },
    MobDefinition {
        species: Species::Skeleton,
        name: "Hollow Skeleton",
        base_hp: 35,
        base_damage: 9,
        move_speed: 1.8,
        aggro_radius: 7.0,
        attack_range: 1.6,
        windup_ms: 600,
        attack_duration_ms: 1500,
        xp_value: 16,
    },
    MobDefinition {
        species: Species::Ogre,
        name: "Moss Ogre",
        base_hp: 90,
        base_damage: 16,
        move_speed: 1.4,
        aggro_radius: 6.0,
        attack_range: 2.2,
        windup_ms: 900,
        attack_duration_ms: 2200,
        xp_value: 40,
    },
];

impl Species {
    /// Static definition for this species.
    pub fn def(self) -> &'static MobDefinition {
        &DEFINITIONS[self as usize]
    }
}

// =============================================================================
// TIERS
// =============================================================================

/// Mob tier with fixed multiplier table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobTier {
    Normal,
    Elite,
    Boss,
}

impl MobTier {
    /// Hit-point multiplier.
    pub fn hp_mult(self) -> f32 {
        match self {
            MobTier::Normal => 1.0,
            MobTier::Elite => 2.5,
            MobTier::Boss => 8.0,
        }
    }

    /// Damage multiplier.
    pub fn damage_mult(self) -> f32 {
        match self {
            MobTier::Normal => 1.0,
            MobTier::Elite => 1.5,
            MobTier::Boss => 2.5,
        }
    }

    /// Movement-speed multiplier.
    pub fn speed_mult(self) -> f32 {
        match self {
            MobTier::Normal => 1.0,
            MobTier::Elite => 1.15,
            MobTier::Boss => 0.9,
        }
    }

    /// Visual scale hint for the (out-of-scope) renderer.
    pub fn visual_scale(self) -> f32 {
        match self {
            MobTier::Normal => 1.0,
            MobTier::Elite => 1.3,
            MobTier::Boss => 2.0,
        }
    }

    /// Flat combat-rating bonus.
    fn combat_rating_bonus(self) -> u32 {
        match self {
            MobTier::Normal => 0,
            MobTier::Elite => 15,
            MobTier::Boss => 40,
        }
    }
}

// =============================================================================
// MODIFIERS & ABILITIES
// =============================================================================

/// Modifier tags carried by special mobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobModifier {
    /// Elite ability: telegraphed frost nova that freezes players
    Frostbound,
}

/// Special abilities with independent cooldown sub-timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobAbility {
    FrostNova,
}

/// Frost nova cooldown between casts.
pub const FROST_NOVA_COOLDOWN_MS: u64 = 8_000;

/// Telegraph delay before the nova resolves.
pub const FROST_NOVA_TELEGRAPH_MS: u64 = 1_500;

/// Nova blast radius.
pub const FROST_NOVA_RADIUS: f32 = 3.0;

/// Freeze duration applied to caught players.
pub const FROST_NOVA_FREEZE_MS: u64 = 2_000;

/// Maximum cast range to a target.
pub const FROST_NOVA_RANGE: f32 = 6.0;

// =============================================================================
// ATTACK CYCLE
// =============================================================================

/// Phase of the committed-attack state machine.
///
/// IMPACT is the instant inside WINDUP at which the windup delay elapses;
/// `damage_applied` guarantees it fires exactly once per cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MobPhase {
    /// Pursuing a target (or idling with none in aggro range)
    Seeking,
    /// Attack committed; waiting for the impact delay
    Windup { started_ms: u64, damage_applied: bool },
    /// Post-impact lock until the total attack duration elapses
    Recovery { until_ms: u64 },
}

// =============================================================================
// MOB INSTANCE
// =============================================================================

/// A live mob in a chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MobInstance {
    pub id: MobId,
    pub species: Species,
    pub tier: MobTier,
    pub level: u32,
    pub position: Vec2,
    pub hp: u32,
    /// Stats snapshot computed once at spawn from (species, level, tier)
    pub stats: EffectiveStats,
    pub phase: MobPhase,
    pub last_attack_ms: u64,
    pub modifiers: BTreeSet<MobModifier>,
    /// Per-ability timestamp at which the ability is next ready
    pub ability_ready_ms: BTreeMap<MobAbility, u64>,
}

impl MobInstance {
    /// Spawn a mob, snapshotting its stats from level and tier.
    pub fn spawn(id: MobId, species: Species, tier: MobTier, level: u32, position: Vec2) -> Self {
        let level = level.max(1);
        let stats = snapshot_stats(species, tier, level);
        let mut modifiers = BTreeSet::new();
        if tier != MobTier::Normal {
            modifiers.insert(MobModifier::Frostbound);
        }

        Self {
            id,
            species,
            tier,
            level,
            position,
            hp: stats.max_hp,
            stats,
            phase: MobPhase::Seeking,
            last_attack_ms: 0,
            modifiers,
            ability_ready_ms: BTreeMap::new(),
        }
    }

    /// Pursuit speed after tier scaling, in units per second.
    pub fn move_speed(&self) -> f32 {
        self.species.def().move_speed * self.tier.speed_mult()
    }

    /// Apply damage. Returns true if the mob died from this hit.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        self.hp = self.hp.saturating_sub(amount);
        self.hp == 0
    }

    /// Whether the mob is alive.
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Experience awarded on death.
    pub fn xp_value(&self) -> u64 {
        let tier_mult = match self.tier {
            MobTier::Normal => 1,
            MobTier::Elite => 3,
            MobTier::Boss => 10,
        };
        self.species.def().xp_value * tier_mult * self.level as u64
    }
}

/// Compute the spawn-time stat snapshot for a mob.
fn snapshot_stats(species: Species, tier: MobTier, level: u32) -> EffectiveStats {
    let def = species.def();
    let level_hp_scale = 1.0 + 0.2 * (level - 1) as f32;
    let level_damage_scale = 1.0 + 0.15 * (level - 1) as f32;

    let max_hp = (def.base_hp as f32 * tier.hp_mult() * level_hp_scale) as u32;
    let damage = (def.base_damage as f32 * tier.damage_mult() * level_damage_scale) as u32;

    EffectiveStats {
        attributes: Attributes::uniform(8 + 2 * level),
        combat_rating: 40 + level * 10 + tier.combat_rating_bonus(),
        damage,
        max_hp,
        max_mp: 0,
        armor: level * 2,
        crit_chance: 0.0,
        attack_speed: 0.0,
    }
}

//! Combat Math
//!
//! Pure functions over stat records: attribute aggregation across gear,
//! the damage formula with its armor mitigation curve, and the
//! combat-rating gate that keeps under-geared attackers from trading
//! evenly with far stronger defenders.
//!
//! The gate and the armor curve are independent levers: armor mitigates
//! smoothly, the gate is a hard progression wall. They compose
//! multiplicatively and must never be conflated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::rng::DeterministicRng;
use crate::game::character::{Archetype, Attributes};
use crate::game::items::{AffixStat, EquipSlot, Item};

/// Base hit points before vitality scaling.
pub const BASE_HP: u32 = 40;

/// Hit points per point of vitality.
pub const HP_PER_VITALITY: u32 = 5;

/// Base mana before intelligence scaling.
pub const BASE_MP: u32 = 20;

/// Mana per point of intelligence.
pub const MP_PER_INTELLIGENCE: u32 = 3;

/// Armor per point of fortitude.
pub const ARMOR_PER_FORTITUDE: u32 = 2;

/// Base critical-hit chance before affixes.
pub const BASE_CRIT_CHANCE: f32 = 0.05;

/// Damage multiplier on a critical hit.
pub const CRIT_MULTIPLIER: f32 = 1.5;

/// Weapon damage contribution of the archetype primary attribute.
pub const PRIMARY_DAMAGE_SCALE: f32 = 0.5;

/// Damage when no weapon is equipped.
pub const UNARMED_DAMAGE: u32 = 2;

/// Level scaling constant in the armor mitigation curve.
pub const ARMOR_CURVE_K: f32 = 50.0;

/// Combat-rating deficit at which the gate engages.
pub const CR_GATE_THRESHOLD: u32 = 10;

/// Outgoing damage multiplier while gated.
pub const CR_GATE_MULTIPLIER: f32 = 0.1;

// =============================================================================
// EFFECTIVE STATS
// =============================================================================

/// Derived stats, recomputed whenever gear or attributes change.
///
/// Never cached across gear changes: the combat-rating gate reads these
/// at evaluation time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectiveStats {
    /// Effective attributes (base + gear + gems)
    pub attributes: Attributes,
    /// Sum of the five effective primaries
    pub combat_rating: u32,
    /// Weapon power + primary-attribute scaling
    pub damage: u32,
    /// Maximum hit points
    pub max_hp: u32,
    /// Maximum mana
    pub max_mp: u32,
    /// Flat armor
    pub armor: u32,
    /// Critical-hit chance in [0, 1]
    pub crit_chance: f32,
    /// Attack-speed bonus as a cooldown divisor fraction
    pub attack_speed: f32,
}

/// Aggregate base attributes with every equipped item's affixes and
/// socketed-gem bonuses, then derive the combat stats.
pub fn recalculate_stats(
    archetype: Archetype,
    base: &Attributes,
    equipment: &BTreeMap<EquipSlot, Item>,
) -> EffectiveStats {
    let mut attributes = *base;
    let mut bonus_hp = 0u32;
    let mut bonus_armor = 0u32;
    let mut crit_chance = BASE_CRIT_CHANCE;
    let mut attack_speed = 0.0f32;

    for item in equipment.values() {
        for affix in item.all_affixes() {
            let value = affix.value.max(0) as u32;
            match affix.stat {
                AffixStat::Strength => attributes.strength += value,
                AffixStat::Dexterity => attributes.dexterity += value,
                AffixStat::Intelligence => attributes.intelligence += value,
                AffixStat::Vitality => attributes.vitality += value,
                AffixStat::Fortitude => attributes.fortitude += value,
                AffixStat::CritChance => crit_chance += value as f32 / 100.0,
                AffixStat::AttackSpeed => attack_speed += value as f32 / 100.0,
                AffixStat::Life => bonus_hp += value,
                AffixStat::Armor => bonus_armor += value,
            }
        }
    }

    let weapon_power = equipment
        .get(&EquipSlot::MainHand)
        .map(|w| w.power)
        .unwrap_or(UNARMED_DAMAGE);
    let primary = attributes.get(archetype.primary_attribute());
    let damage = weapon_power + (primary as f32 * PRIMARY_DAMAGE_SCALE) as u32;

    EffectiveStats {
        attributes,
        combat_rating: attributes.total(),
        damage,
        max_hp: BASE_HP + attributes.vitality * HP_PER_VITALITY + bonus_hp,
        max_mp: BASE_MP + attributes.intelligence * MP_PER_INTELLIGENCE,
        armor: attributes.fortitude * ARMOR_PER_FORTITUDE + bonus_armor,
        crit_chance: crit_chance.min(1.0),
        attack_speed,
    }
}

/// God-mode status override, applied *after* recalculation so it survives
/// gear changes instead of being clobbered by the next recompute.
pub fn apply_god_mode(stats: &mut EffectiveStats) {
    stats.damage = stats.damage.saturating_mul(100);
    stats.crit_chance = 1.0;
    stats.armor = stats.armor.saturating_add(100_000);
    stats.combat_rating = stats.combat_rating.saturating_add(10_000);
}

// =============================================================================
// DAMAGE FORMULA
// =============================================================================

/// Outcome of one damage calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageResult {
    /// Final damage (floored, >= 1 on any recorded hit)
    pub damage: u32,
    /// Was this a critical hit?
    pub crit: bool,
    /// Did the combat-rating gate engage?
    pub gated: bool,
}

/// Diminishing-returns armor mitigation: `armor / (armor + k * level)`.
///
/// Stays in [0, 1) for armor >= 0 and level >= 1, approaching 1 as
/// armor grows without bound.
pub fn armor_mitigation(armor: u32, attacker_level: u32) -> f32 {
    let armor = armor as f32;
    armor / (armor + ARMOR_CURVE_K * attacker_level.max(1) as f32)
}

/// Resolve one hit from attacker to defender.
///
/// Rolls the crit, applies the armor curve, then the combat-rating gate;
/// the two reductions compose multiplicatively. The result is floored to
/// an integer with a minimum of 1.
pub fn calculate_damage(
    attacker: &EffectiveStats,
    defender: &EffectiveStats,
    attacker_level: u32,
    skill_multiplier: f32,
    rng: &mut DeterministicRng,
) -> DamageResult {
    let crit = rng.chance(attacker.crit_chance);

    let mut damage = attacker.damage as f32 * skill_multiplier;
    if crit {
        damage *= CRIT_MULTIPLIER;
    }

    damage *= 1.0 - armor_mitigation(defender.armor, attacker_level);

    // Gear-progression gate: badly outmatched attackers hit for a fixed
    // fraction, independent of the armor curve.
    let gated = attacker.combat_rating + CR_GATE_THRESHOLD <= defender.combat_rating;
    if gated {
        damage *= CR_GATE_MULTIPLIER;
    }

    DamageResult {
        damage: (damage.floor() as u32).max(1),
        crit,
        gated,
    }
}

//! Loot Generation
//!
//! Rolls item drops: level-biased rarity, level-scaled power with symmetric
//! variance, affix sets drawn from primary/secondary pools with a smart-loot
//! bias toward the requesting archetype, legendary flavor powers, and the
//! two-gate socket roll on socketable bases.
//!
//! Intentionally non-deterministic from the caller's point of view (the
//! zone RNG advances between calls); tested on distributional and invariant
//! properties only.

use crate::core::rng::DeterministicRng;
use crate::game::character::{Archetype, AttributeKind};
use crate::game::items::{Affix, AffixStat, FlavorPower, Item, ItemClass, Rarity};
use uuid::Uuid;

/// Probability an affix slot draws from the primary-attribute pool.
const PRIMARY_POOL_CHANCE: f32 = 0.5;

/// Smart-loot bias: chance a primary-pool draw picks the archetype primary.
const SMART_LOOT_BIAS: f32 = 0.9;

/// Chance a socketable base rolls its first socket.
const FIRST_SOCKET_CHANCE: f32 = 0.3;

/// Chance of a second socket once the first rolled.
const SECOND_SOCKET_CHANCE: f32 = 0.25;

/// Base types loot can roll.
const BASE_TYPES: [(&str, ItemClass); 10] = [
    ("Shortsword", ItemClass::Weapon),
    ("Warhammer", ItemClass::Weapon),
    ("Hunting Bow", ItemClass::Weapon),
    ("Ashwood Staff", ItemClass::Weapon),
    ("Coif", ItemClass::Helm),
    ("Hauberk", ItemClass::ChestArmor),
    ("Greaves", ItemClass::LegArmor),
    ("Treads", ItemClass::Boots),
    ("Talisman", ItemClass::Amulet),
    ("Band", ItemClass::Ring),
];

/// Roll an item drop for a kill or grant at the given level.
///
/// When `archetype` is supplied, primary-pool affixes are biased 90%
/// toward that archetype's designated attribute (smart loot).
pub fn generate_loot(rng: &mut DeterministicRng, level: u32, archetype: Option<Archetype>) -> Item {
    let level = level.max(1);
    let rarity = roll_rarity(rng, level);
    let power = roll_power(rng, level);
    let (base_name, class) = *rng.pick(&BASE_TYPES);

    let affixes = (0..rarity.affix_count())
        .map(|_| roll_affix(rng, power, archetype))
        .collect();

    let flavor = if rarity == Rarity::Legendary {
        Some(*rng.pick(&FlavorPower::ALL))
    } else {
        None
    };

    let sockets = if class.socketable() {
        roll_sockets(rng)
    } else {
        0
    };

    Item {
        id: Uuid::new_v4(),
        name: format!("{} {}", rarity.name_prefix(), base_name),
        class,
        rarity,
        power,
        required_level: level.saturating_sub(2).max(1),
        affixes,
        sockets,
        gems: Vec::new(),
        flavor,
    }
}

/// Roll a gem (socketable stat stone) at the given level.
pub fn generate_gem(rng: &mut DeterministicRng, level: u32) -> Item {
    let level = level.max(1);
    let power = roll_power(rng, level) / 2;
    let affix = roll_affix(rng, power.max(2), None);

    Item {
        id: Uuid::new_v4(),
        name: "Chipped Emberstone".into(),
        class: ItemClass::Gem,
        rarity: Rarity::Magic,
        power,
        required_level: 1,
        affixes: vec![affix],
        sockets: 0,
        gems: Vec::new(),
        flavor: None,
    }
}

/// Level-biased weighted rarity roll. Higher levels shift weight away
/// from common toward rare and legendary.
fn roll_rarity(rng: &mut DeterministicRng, level: u32) -> Rarity {
    let legendary = 1 + level / 2;
    let rare = 8 + level;
    let magic = 30 + level;
    let common = 60u32;

    let total = common + magic + rare + legendary;
    let roll = rng.next_int(total);

    if roll < legendary {
        Rarity::Legendary
    } else if roll < legendary + rare {
        Rarity::Rare
    } else if roll < legendary + rare + magic {
        Rarity::Magic
    } else {
        Rarity::Common
    }
}

/// Level-scaled item power with symmetric +/-20% variance.
fn roll_power(rng: &mut DeterministicRng, level: u32) -> u32 {
    let base = (5 + level * 3) as i32;
    let spread = (base / 5).max(1);
    (base + rng.next_int_range(-spread, spread)).max(1) as u32
}

/// Roll one affix: pool choice, stat choice, power-scaled magnitude.
fn roll_affix(rng: &mut DeterministicRng, power: u32, archetype: Option<Archetype>) -> Affix {
    if rng.chance(PRIMARY_POOL_CHANCE) {
        let stat = roll_primary_stat(rng, archetype);
        let value = (power as f32 * rng.next_f32_range(0.15, 0.35)).max(1.0) as i32;
        Affix { stat, value }
    } else {
        let stat = *rng.pick(&AffixStat::SECONDARY);
        let value = match stat {
            AffixStat::CritChance => rng.next_int_range(1, 5),
            AffixStat::AttackSpeed => rng.next_int_range(3, 10),
            AffixStat::Life => (power as f32 * rng.next_f32_range(0.5, 1.0)).max(1.0) as i32,
            AffixStat::Armor => (power as f32 * rng.next_f32_range(0.3, 0.6)).max(1.0) as i32,
            _ => unreachable!("secondary pool only"),
        };
        Affix { stat, value }
    }
}

/// Primary-pool stat choice with the smart-loot bias.
fn roll_primary_stat(rng: &mut DeterministicRng, archetype: Option<Archetype>) -> AffixStat {
    if let Some(archetype) = archetype {
        if rng.chance(SMART_LOOT_BIAS) {
            return primary_affix(archetype.primary_attribute());
        }
    }
    *rng.pick(&AffixStat::PRIMARY)
}

fn primary_affix(kind: AttributeKind) -> AffixStat {
    match kind {
        AttributeKind::Strength => AffixStat::Strength,
        AttributeKind::Dexterity => AffixStat::Dexterity,
        AttributeKind::Intelligence => AffixStat::Intelligence,
        AttributeKind::Vitality => AffixStat::Vitality,
        AttributeKind::Fortitude => AffixStat::Fortitude,
    }
}

/// Two independent probability gates: first socket, then maybe a second.
fn roll_sockets(rng: &mut DeterministicRng) -> u8 {
    if !rng.chance(FIRST_SOCKET_CHANCE) {
        return 0;
    }
    if rng.chance(SECOND_SOCKET_CHANCE) {
        2
    } else {
        1
    }
}

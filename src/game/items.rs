//! Items & Equipment
//!
//! Item instances, rarity tiers, affixes, sockets and the equipment slot
//! table. Items are immutable once rolled except for gaining socketed gems.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum items a player can carry.
pub const INVENTORY_CAP: usize = 25;

// =============================================================================
// EQUIPMENT SLOTS
// =============================================================================

/// Named equipment slots (10 total).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Head,
    Chest,
    Legs,
    Boots,
    Gloves,
    Belt,
    Amulet,
    RingLeft,
    RingRight,
    MainHand,
}

impl EquipSlot {
    /// All slots, in display order.
    pub const ALL: [EquipSlot; 10] = [
        EquipSlot::Head,
        EquipSlot::Chest,
        EquipSlot::Legs,
        EquipSlot::Boots,
        EquipSlot::Gloves,
        EquipSlot::Belt,
        EquipSlot::Amulet,
        EquipSlot::RingLeft,
        EquipSlot::RingRight,
        EquipSlot::MainHand,
    ];
}

// =============================================================================
// ITEM CLASSIFICATION
// =============================================================================

/// Slot classification of an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    Weapon,
    Helm,
    ChestArmor,
    LegArmor,
    Boots,
    Gloves,
    Belt,
    Amulet,
    Ring,
    /// Socketed into other items, never equipped directly.
    Gem,
}

impl ItemClass {
    /// Whether an item of this class may occupy the given equipment slot.
    pub fn fits_slot(self, slot: EquipSlot) -> bool {
        matches!(
            (self, slot),
            (ItemClass::Weapon, EquipSlot::MainHand)
                | (ItemClass::Helm, EquipSlot::Head)
                | (ItemClass::ChestArmor, EquipSlot::Chest)
                | (ItemClass::LegArmor, EquipSlot::Legs)
                | (ItemClass::Boots, EquipSlot::Boots)
                | (ItemClass::Gloves, EquipSlot::Gloves)
                | (ItemClass::Belt, EquipSlot::Belt)
                | (ItemClass::Amulet, EquipSlot::Amulet)
                | (ItemClass::Ring, EquipSlot::RingLeft)
                | (ItemClass::Ring, EquipSlot::RingRight)
        )
    }

    /// Whether bases of this class can roll sockets.
    pub fn socketable(self) -> bool {
        matches!(
            self,
            ItemClass::Weapon | ItemClass::Helm | ItemClass::ChestArmor
        )
    }
}

// =============================================================================
// RARITY
// =============================================================================

/// Item rarity tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Magic,
    Rare,
    Legendary,
}

impl Rarity {
    /// Number of affixes rolled at this rarity.
    pub fn affix_count(self) -> usize {
        match self {
            Rarity::Common => 1,
            Rarity::Magic => 2,
            Rarity::Rare => 3,
            Rarity::Legendary => 4,
        }
    }

    /// Sell-value multiplier.
    pub fn value_mult(self) -> u64 {
        match self {
            Rarity::Common => 1,
            Rarity::Magic => 3,
            Rarity::Rare => 8,
            Rarity::Legendary => 25,
        }
    }

    /// Name prefix for generated items.
    pub fn name_prefix(self) -> &'static str {
        match self {
            Rarity::Common => "Worn",
            Rarity::Magic => "Runed",
            Rarity::Rare => "Emberforged",
            Rarity::Legendary => "Mythic",
        }
    }
}

// =============================================================================
// AFFIXES
// =============================================================================

/// Stat key an affix can roll on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffixStat {
    Strength,
    Dexterity,
    Intelligence,
    Vitality,
    Fortitude,
    CritChance,
    AttackSpeed,
    Life,
    Armor,
}

impl AffixStat {
    /// The five primary-attribute affixes.
    pub const PRIMARY: [AffixStat; 5] = [
        AffixStat::Strength,
        AffixStat::Dexterity,
        AffixStat::Intelligence,
        AffixStat::Vitality,
        AffixStat::Fortitude,
    ];

    /// The secondary affix pool.
    pub const SECONDARY: [AffixStat; 4] = [
        AffixStat::CritChance,
        AffixStat::AttackSpeed,
        AffixStat::Life,
        AffixStat::Armor,
    ];

    /// Whether this is one of the five primary attributes.
    pub fn is_primary(self) -> bool {
        Self::PRIMARY.contains(&self)
    }
}

/// A rolled affix: stat key plus integer magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affix {
    /// Stat the affix grants
    pub stat: AffixStat,
    /// Rolled magnitude
    pub value: i32,
}

// =============================================================================
// LEGENDARY FLAVOR POWERS
// =============================================================================

/// Unique legendary powers. An item carries at most one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlavorPower {
    /// Attacks chain lightning to a nearby enemy
    Stormcall,
    /// A fraction of damage dealt returns as life
    Vampiric,
    /// Attackers take a portion of damage back
    Thornskin,
    /// Critical hits detonate in a small burst
    Shockburst,
    /// Potion charges refill faster
    Alchemist,
}

impl FlavorPower {
    /// All flavor powers, for loot rolls.
    pub const ALL: [FlavorPower; 5] = [
        FlavorPower::Stormcall,
        FlavorPower::Vampiric,
        FlavorPower::Thornskin,
        FlavorPower::Shockburst,
        FlavorPower::Alchemist,
    ];
}

// =============================================================================
// ITEM INSTANCE
// =============================================================================

/// A rolled item instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    /// Unique item identity
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Slot classification
    pub class: ItemClass,
    /// Rarity tier
    pub rarity: Rarity,
    /// Item power (drives damage and affix magnitudes)
    pub power: u32,
    /// Minimum character level to equip
    pub required_level: u32,
    /// Rolled affixes, in roll order
    pub affixes: Vec<Affix>,
    /// Socket count (0 for non-socketable bases)
    pub sockets: u8,
    /// Gems currently socketed (len <= sockets)
    pub gems: Vec<Item>,
    /// Legendary flavor power, if any
    pub flavor: Option<FlavorPower>,
}

impl Item {
    /// Computed vendor sell value.
    pub fn sell_value(&self) -> u64 {
        let affix_bonus = self.affixes.len() as u64 * 2;
        (self.power as u64 + affix_bonus) * self.rarity.value_mult()
    }

    /// Whether the item has an open socket.
    pub fn has_open_socket(&self) -> bool {
        (self.gems.len() as u8) < self.sockets
    }

    /// Socket a gem. Returns the gem back on failure (full or wrong class).
    pub fn try_socket(&mut self, gem: Item) -> Result<(), Item> {
        if gem.class != ItemClass::Gem || !self.has_open_socket() {
            return Err(gem);
        }
        self.gems.push(gem);
        Ok(())
    }

    /// All affixes contributed by this item, including socketed gems.
    pub fn all_affixes(&self) -> impl Iterator<Item = &Affix> {
        self.affixes
            .iter()
            .chain(self.gems.iter().flat_map(|g| g.affixes.iter()))
    }
}

/// Check the equipment invariant: every equipped item's class matches its slot.
pub fn equipment_well_formed(equipment: &BTreeMap<EquipSlot, Item>) -> bool {
    equipment
        .iter()
        .all(|(slot, item)| item.class.fits_slot(*slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_item(class: ItemClass, power: u32) -> Item {
        Item {
            id: Uuid::new_v4(),
            name: "Test Item".into(),
            class,
            rarity: Rarity::Common,
            power,
            required_level: 1,
            affixes: Vec::new(),
            sockets: 0,
            gems: Vec::new(),
            flavor: None,
        }
    }

    #[test]
    fn test_slot_classification() {
        assert!(ItemClass::Weapon.fits_slot(EquipSlot::MainHand));
        assert!(!ItemClass::Weapon.fits_slot(EquipSlot::Head));
        assert!(ItemClass::Ring.fits_slot(EquipSlot::RingLeft));
        assert!(ItemClass::Ring.fits_slot(EquipSlot::RingRight));
        assert!(!ItemClass::Gem.fits_slot(EquipSlot::Amulet));
    }

    #[test]
    fn test_socketable_classes() {
        assert!(ItemClass::Weapon.socketable());
        assert!(ItemClass::ChestArmor.socketable());
        assert!(!ItemClass::Ring.socketable());
        assert!(!ItemClass::Gem.socketable());
    }

    #[test]
    fn test_socket_gem() {
        let mut weapon = plain_item(ItemClass::Weapon, 10);
        weapon.sockets = 1;

        let gem = plain_item(ItemClass::Gem, 5);
        assert!(weapon.try_socket(gem).is_ok());
        assert!(!weapon.has_open_socket());

        // Second gem bounces off the full socket list
        let gem2 = plain_item(ItemClass::Gem, 5);
        assert!(weapon.try_socket(gem2).is_err());
    }

    #[test]
    fn test_socket_rejects_non_gem() {
        let mut weapon = plain_item(ItemClass::Weapon, 10);
        weapon.sockets = 2;

        let not_a_gem = plain_item(ItemClass::Ring, 5);
        assert!(weapon.try_socket(not_a_gem).is_err());
        assert!(weapon.gems.is_empty());
    }

    #[test]
    fn test_all_affixes_includes_gems() {
        let mut weapon = plain_item(ItemClass::Weapon, 10);
        weapon.sockets = 1;
        weapon.affixes.push(Affix {
            stat: AffixStat::Strength,
            value: 5,
        });

        let mut gem = plain_item(ItemClass::Gem, 5);
        gem.affixes.push(Affix {
            stat: AffixStat::Vitality,
            value: 3,
        });
        weapon.try_socket(gem).unwrap();

        let stats: Vec<AffixStat> = weapon.all_affixes().map(|a| a.stat).collect();
        assert_eq!(stats, vec![AffixStat::Strength, AffixStat::Vitality]);
    }

    #[test]
    fn test_sell_value_scales_with_rarity() {
        let mut common = plain_item(ItemClass::Weapon, 10);
        let mut legendary = common.clone();
        common.rarity = Rarity::Common;
        legendary.rarity = Rarity::Legendary;

        assert!(legendary.sell_value() > common.sell_value());
    }
}

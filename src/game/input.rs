//! Player Actions
//!
//! The in-process simulation boundary: every validated client action is
//! one of these records, handed synchronously to the input handler in
//! `tick.rs`. The admin family is silently ignored for non-admin accounts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::character::{AttributeKind, SkillId};
use crate::game::items::{EquipSlot, Rarity};
use crate::game::mobs::{MobId, MobTier, Species};
use crate::game::state::Weather;

/// A validated client action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerAction {
    /// Move to a requested position; `dt_ms` is the gateway-measured time
    /// since the last accepted movement (anti-cheat budget input).
    Move { x: f32, y: f32, dt_ms: u64 },
    /// Swing at a mob
    Attack { target: MobId },
    /// Drink a potion charge
    Heal,
    /// Spend one stat point
    DistributeStat { attribute: AttributeKind },
    /// Spend one skill point
    UpgradeSkill { skill: SkillId },
    /// Bind a learned skill to a loadout slot
    AssignSkill { slot: usize, skill: SkillId },
    /// Equip an inventory item into a slot
    EquipItem { item: Uuid, slot: EquipSlot },
    /// Move an equipped item back to the inventory
    UnequipItem { slot: EquipSlot },
    /// Socket an inventory gem into an owned item
    SocketGem { item: Uuid, gem: Uuid },
    /// Return to the respawn point after death
    Respawn,

    // Admin family
    AdminTp { x: f32, y: f32 },
    AdminSummon { target: Uuid },
    AdminKill { target: Uuid },
    AdminBan { target: Uuid },
    AdminGodMode,
    AdminSetWeather { weather: Weather },
    AdminSetTime { time_of_day: u32 },
    AdminSpawn { species: Species, tier: MobTier },
    AdminAddItem,
    AdminAddGold { amount: u64 },
}

impl PlayerAction {
    /// Whether this action requires an admin account.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            PlayerAction::AdminTp { .. }
                | PlayerAction::AdminSummon { .. }
                | PlayerAction::AdminKill { .. }
                | PlayerAction::AdminBan { .. }
                | PlayerAction::AdminGodMode
                | PlayerAction::AdminSetWeather { .. }
                | PlayerAction::AdminSetTime { .. }
                | PlayerAction::AdminSpawn { .. }
                | PlayerAction::AdminAddItem
                | PlayerAction::AdminAddGold { .. }
        )
    }
}

/// Small result record returned to the caller for some actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionResult {
    Moved { x: f32, y: f32 },
    Attack { damage: u32, crit: bool, killed: bool },
    Healed { amount: u32, charges_left: u8 },
    Respawned,
    ItemGranted { item: Uuid, name: String, rarity: Rarity },
}

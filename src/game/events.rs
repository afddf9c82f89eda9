//! Presentation Events
//!
//! Asynchronous event records emitted by the simulation for the external
//! renderer to play back (effects, popups, HUD updates). The simulation
//! never waits on these; they are drained after each tick or input.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::vec2::Vec2;
use crate::game::items::Rarity;
use crate::game::mobs::{MobId, Species};
use crate::game::state::Weather;

/// A renderer-facing event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresentationEvent {
    /// Damage was dealt to a mob or player
    DamageDealt {
        target_mob: Option<MobId>,
        target_player: Option<Uuid>,
        amount: u32,
        crit: bool,
    },

    /// A mob died
    MobDied {
        mob: MobId,
        species: Species,
        position: Vec2,
    },

    /// A player picked up loot
    LootCollected {
        player: Uuid,
        item: Uuid,
        name: String,
        rarity: Rarity,
    },

    /// A gem was socketed successfully
    SocketSuccess { player: Uuid, item: Uuid },

    /// A player drank a potion
    PotionUsed { player: Uuid, healed: u32, charges_left: u8 },

    /// Potion charges refilled after the cooldown
    PotionsRefilled { player: Uuid },

    /// A player leveled up
    LevelUp { player: Uuid, level: u32 },

    /// A player died
    PlayerDied { player: Uuid, position: Vec2 },

    /// A player respawned
    RespawnEffect { player: Uuid, position: Vec2 },

    /// A player was frozen by a frost effect
    PlayerFrozen { player: Uuid, until_ms: u64 },

    /// An elite telegraphed a frost nova
    FrostNovaTelegraph {
        caster: MobId,
        center: Vec2,
        radius: f32,
        resolves_at_ms: u64,
    },

    /// The weather rotated
    WeatherChanged { weather: Weather },

    /// A player was banned by an admin
    PlayerBanned { player: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_type_tag() {
        let event = PresentationEvent::LevelUp {
            player: Uuid::nil(),
            level: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"LEVEL_UP\""));
    }

    #[test]
    fn test_event_roundtrip() {
        let event = PresentationEvent::WeatherChanged {
            weather: Weather::Rain,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PresentationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}

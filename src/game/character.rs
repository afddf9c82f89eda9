//! Characters & Persistence Boundary
//!
//! Archetypes, base attributes, skill progression, and the persisted
//! character record owned by the external account service. The record is
//! read once at session start and written back through the
//! [`CharacterStore`] checkpoint call point (level-up, logout).

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::items::{EquipSlot, Item};

/// Number of active skill slots.
pub const SKILL_SLOTS: usize = 4;

/// Maximum rank any skill can reach.
pub const MAX_SKILL_RANK: u8 = 5;

/// Stat points granted per level-up.
pub const STAT_POINTS_PER_LEVEL: u32 = 3;

/// Skill points granted per level-up.
pub const SKILL_POINTS_PER_LEVEL: u32 = 1;

// =============================================================================
// ATTRIBUTES
// =============================================================================

/// The five primary attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Strength,
    Dexterity,
    Intelligence,
    Vitality,
    Fortitude,
}

/// A full attribute block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: u32,
    pub dexterity: u32,
    pub intelligence: u32,
    pub vitality: u32,
    pub fortitude: u32,
}

impl Attributes {
    /// All attributes at the same value.
    pub const fn uniform(value: u32) -> Self {
        Self {
            strength: value,
            dexterity: value,
            intelligence: value,
            vitality: value,
            fortitude: value,
        }
    }

    /// Read one attribute.
    pub fn get(&self, kind: AttributeKind) -> u32 {
        match kind {
            AttributeKind::Strength => self.strength,
            AttributeKind::Dexterity => self.dexterity,
            AttributeKind::Intelligence => self.intelligence,
            AttributeKind::Vitality => self.vitality,
            AttributeKind::Fortitude => self.fortitude,
        }
    }

    /// Add to one attribute.
    pub fn add(&mut self, kind: AttributeKind, amount: u32) {
        let slot = match kind {
            AttributeKind::Strength => &mut self.strength,
            AttributeKind::Dexterity => &mut self.dexterity,
            AttributeKind::Intelligence => &mut self.intelligence,
            AttributeKind::Vitality => &mut self.vitality,
            AttributeKind::Fortitude => &mut self.fortitude,
        };
        *slot = slot.saturating_add(amount);
    }

    /// Sum of all five attributes (the combat-rating base).
    pub fn total(&self) -> u32 {
        self.strength + self.dexterity + self.intelligence + self.vitality + self.fortitude
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::uniform(10)
    }
}

// =============================================================================
// ARCHETYPES
// =============================================================================

/// Playable archetypes. Each has a designated primary attribute that
/// drives weapon damage scaling and smart-loot bias.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Warrior,
    Ranger,
    Sorcerer,
}

impl Archetype {
    /// The archetype's designated primary attribute.
    pub fn primary_attribute(self) -> AttributeKind {
        match self {
            Archetype::Warrior => AttributeKind::Strength,
            Archetype::Ranger => AttributeKind::Dexterity,
            Archetype::Sorcerer => AttributeKind::Intelligence,
        }
    }

    /// Starting attribute spread for a fresh character.
    pub fn starting_attributes(self) -> Attributes {
        let mut attrs = Attributes::uniform(10);
        attrs.add(self.primary_attribute(), 5);
        attrs
    }
}

// =============================================================================
// SKILLS
// =============================================================================

/// Skill identifier from the static skill catalog.
pub type SkillId = u16;

/// A character's skill loadout and rank progression.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillProgression {
    /// Active loadout: 4 slots, each optionally bound to a skill
    pub loadout: [Option<SkillId>; SKILL_SLOTS],
    /// Per-skill rank (absent = rank 0, unlearned)
    pub ranks: BTreeMap<SkillId, u8>,
}

impl SkillProgression {
    /// Current rank of a skill (0 = unlearned).
    pub fn rank(&self, skill: SkillId) -> u8 {
        self.ranks.get(&skill).copied().unwrap_or(0)
    }
}

// =============================================================================
// PERSISTED RECORD
// =============================================================================

/// The persisted character record, owned by the external account service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: Uuid,
    pub name: String,
    pub archetype: Archetype,
    pub level: u32,
    pub experience: u64,
    pub attributes: Attributes,
    pub unspent_stat_points: u32,
    pub unspent_skill_points: u32,
    pub gold: u64,
    pub inventory: Vec<Item>,
    pub equipment: BTreeMap<EquipSlot, Item>,
    pub skills: SkillProgression,
    /// Admin accounts may issue the admin command family.
    pub admin: bool,
}

impl CharacterRecord {
    /// Create a fresh level-1 character.
    pub fn new(name: impl Into<String>, archetype: Archetype) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            archetype,
            level: 1,
            experience: 0,
            attributes: archetype.starting_attributes(),
            unspent_stat_points: 0,
            unspent_skill_points: 1,
            gold: 0,
            inventory: Vec::new(),
            equipment: BTreeMap::new(),
            skills: SkillProgression::default(),
            admin: false,
        }
    }
}

/// Experience required to advance from `level` to `level + 1`.
pub fn xp_to_next_level(level: u32) -> u64 {
    100 * (level as u64) * (level as u64)
}

// =============================================================================
// CHARACTER STORE
// =============================================================================

/// Persistence boundary for character records.
///
/// The real implementation lives in the account service; the simulation
/// only loads at session start and checkpoints on level-up and logout.
pub trait CharacterStore: Send + Sync {
    /// Load a character record by id.
    fn load(&self, id: &Uuid) -> Option<CharacterRecord>;

    /// Write back a character record (checkpoint call point).
    fn checkpoint(&self, record: CharacterRecord);
}

/// In-memory store backing tests and the demo binary.
#[derive(Default)]
pub struct MemoryCharacterStore {
    records: RwLock<BTreeMap<Uuid, CharacterRecord>>,
}

impl MemoryCharacterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning its id.
    pub fn insert(&self, record: CharacterRecord) -> Uuid {
        let id = record.id;
        self.records.write().expect("store lock poisoned").insert(id, record);
        id
    }
}

impl CharacterStore for MemoryCharacterStore {
    fn load(&self, id: &Uuid) -> Option<CharacterRecord> {
        self.records.read().expect("store lock poisoned").get(id).cloned()
    }

    fn checkpoint(&self, record: CharacterRecord) {
        self.records
            .write()
            .expect("store lock poisoned")
            .insert(record.id, record);
    }
}

//! Chunks & Procedural Generation
//!
//! Lazily generated, cached tile regions of the world. The tile grid and
//! biome of a chunk are a pure function of (chunk coords, zone seed); the
//! mob population is deterministic in placement but carries fresh ids and
//! is leveled to the requesting player.
//!
//! Chunks are a cache, not durable state: they are generated when a
//! player's 3x3 neighborhood first needs them and dropped once outside it.

use serde::{Deserialize, Serialize};

use crate::core::noise::{fbm, FBM_OCTAVES, FBM_PERSISTENCE};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::mobs::{MobIdAllocator, MobInstance, MobTier, Species};

/// Tiles per chunk edge.
pub const CHUNK_TILES: usize = 16;

/// World units per tile.
pub const TILE_SIZE: f32 = 1.0;

/// World units per chunk edge.
pub const CHUNK_WORLD_SIZE: f32 = CHUNK_TILES as f32 * TILE_SIZE;

/// Terrain noise base frequency (per world unit).
const TERRAIN_FREQUENCY: f32 = 0.05;

/// Elevation below this is water.
const WATER_THRESHOLD: f32 = 0.32;

/// Elevation below this (and above water) is sand.
const SAND_THRESHOLD: f32 = 0.40;

/// Elevation above this is extruded mountain.
const MOUNTAIN_THRESHOLD: f32 = 0.72;

/// Chance a mountain tile carries a rock prop.
const ROCK_PROP_CHANCE: f32 = 0.3;

/// Chance a grass tile carries a tree prop.
const TREE_PROP_CHANCE: f32 = 0.05;

/// Chance each spawned mob is tagged elite.
const ELITE_CHANCE: f32 = 0.1;

// =============================================================================
// TILES & BIOMES
// =============================================================================

/// Terrain tile id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileId {
    Water = 0,
    Sand = 1,
    Grass = 2,
    Mountain = 3,
}

impl TileId {
    /// Mobs never spawn in water.
    pub fn spawnable(self) -> bool {
        self != TileId::Water
    }
}

/// Biome tag, decided from the chunk's mean elevation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Lakeland,
    Coast,
    Meadow,
    Highlands,
}

impl Biome {
    /// Species that can spawn in this biome.
    pub fn spawn_table(self) -> &'static [Species] {
        match self {
            Biome::Lakeland => &[Species::Wolf, Species::Bandit],
            Biome::Coast => &[Species::Boar, Species::Bandit],
            Biome::Meadow => &[Species::Boar, Species::Wolf, Species::Bandit],
            Biome::Highlands => &[Species::Wolf, Species::Skeleton, Species::Ogre],
        }
    }
}

/// Decorative props spawned with the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropKind {
    Rock,
    Tree,
}

/// A prop placed on a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prop {
    pub kind: PropKind,
    pub tile_x: u8,
    pub tile_y: u8,
}

// =============================================================================
// CHUNK
// =============================================================================

/// One cached tile region plus the entities generated alongside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub cx: i32,
    pub cy: i32,
    pub biome: Biome,
    /// Row-major CHUNK_TILES x CHUNK_TILES tile grid, immutable once built
    tiles: Vec<TileId>,
    pub props: Vec<Prop>,
    pub mobs: Vec<MobInstance>,
}

impl Chunk {
    /// Tile at local coordinates.
    pub fn tile(&self, tx: usize, ty: usize) -> TileId {
        self.tiles[ty * CHUNK_TILES + tx]
    }

    /// The full tile grid, row-major.
    pub fn tiles(&self) -> &[TileId] {
        &self.tiles
    }

    /// World-space position of a tile center.
    pub fn tile_center(&self, tx: usize, ty: usize) -> Vec2 {
        Vec2::new(
            self.cx as f32 * CHUNK_WORLD_SIZE + (tx as f32 + 0.5) * TILE_SIZE,
            self.cy as f32 * CHUNK_WORLD_SIZE + (ty as f32 + 0.5) * TILE_SIZE,
        )
    }

    /// Wire-format chunk key ("x,y").
    pub fn key(&self) -> String {
        format!("{},{}", self.cx, self.cy)
    }
}

/// Chunk coordinates containing a world-space position.
pub fn chunk_coords_of(pos: Vec2) -> (i32, i32) {
    (
        (pos.x / CHUNK_WORLD_SIZE).floor() as i32,
        (pos.y / CHUNK_WORLD_SIZE).floor() as i32,
    )
}

// =============================================================================
// GENERATION
// =============================================================================

/// Per-chunk RNG seed: mixes the zone seed with the chunk coordinates so
/// prop and mob placement is reproducible per chunk.
fn chunk_seed(seed: u64, cx: i32, cy: i32) -> u64 {
    seed ^ (cx as i64 as u64).wrapping_mul(0x9E3779B185EBCA87)
        ^ (cy as i64 as u64).wrapping_mul(0xC2B2AE3D27D4EB4F)
}

/// Generate one chunk.
///
/// The tile grid and biome depend only on (cx, cy, seed); mob levels
/// follow `requesting_level`, and mob ids are freshly allocated each call.
pub fn generate_chunk(
    seed: u64,
    cx: i32,
    cy: i32,
    requesting_level: u32,
    ids: &mut MobIdAllocator,
) -> Chunk {
    let mut rng = DeterministicRng::new(chunk_seed(seed, cx, cy));
    let mut tiles = Vec::with_capacity(CHUNK_TILES * CHUNK_TILES);
    let mut props = Vec::new();
    let mut elevation_sum = 0.0f32;

    for ty in 0..CHUNK_TILES {
        for tx in 0..CHUNK_TILES {
            let wx = cx as f32 * CHUNK_WORLD_SIZE + tx as f32 * TILE_SIZE;
            let wy = cy as f32 * CHUNK_WORLD_SIZE + ty as f32 * TILE_SIZE;
            let elevation = fbm(
                wx * TERRAIN_FREQUENCY,
                wy * TERRAIN_FREQUENCY,
                seed,
                FBM_OCTAVES,
                FBM_PERSISTENCE,
            );
            elevation_sum += elevation;

            let tile = if elevation < WATER_THRESHOLD {
                TileId::Water
            } else if elevation < SAND_THRESHOLD {
                TileId::Sand
            } else if elevation > MOUNTAIN_THRESHOLD {
                if rng.chance(ROCK_PROP_CHANCE) {
                    props.push(Prop {
                        kind: PropKind::Rock,
                        tile_x: tx as u8,
                        tile_y: ty as u8,
                    });
                }
                TileId::Mountain
            } else {
                if rng.chance(TREE_PROP_CHANCE) {
                    props.push(Prop {
                        kind: PropKind::Tree,
                        tile_x: tx as u8,
                        tile_y: ty as u8,
                    });
                }
                TileId::Grass
            };
            tiles.push(tile);
        }
    }

    let mean_elevation = elevation_sum / (CHUNK_TILES * CHUNK_TILES) as f32;
    let biome = if mean_elevation < WATER_THRESHOLD {
        Biome::Lakeland
    } else if mean_elevation < SAND_THRESHOLD + 0.05 {
        Biome::Coast
    } else if mean_elevation > 0.58 {
        Biome::Highlands
    } else {
        Biome::Meadow
    };

    let mut chunk = Chunk {
        cx,
        cy,
        biome,
        tiles,
        props,
        mobs: Vec::new(),
    };

    populate_mobs(&mut chunk, &mut rng, requesting_level, ids);
    chunk
}

/// Place 1-3 mobs on pseudo-random non-water tiles.
fn populate_mobs(
    chunk: &mut Chunk,
    rng: &mut DeterministicRng,
    requesting_level: u32,
    ids: &mut MobIdAllocator,
) {
    let count = 1 + rng.next_int(3);
    let level = requesting_level.max(1);
    let table = chunk.biome.spawn_table();

    for _ in 0..count {
        // Bounded retry for a spawnable tile; a fully flooded chunk
        // simply spawns fewer mobs.
        for _ in 0..32 {
            let tx = rng.next_int(CHUNK_TILES as u32) as usize;
            let ty = rng.next_int(CHUNK_TILES as u32) as usize;
            if !chunk.tile(tx, ty).spawnable() {
                continue;
            }

            let species = *rng.pick(table);
            let tier = if rng.chance(ELITE_CHANCE) {
                MobTier::Elite
            } else {
                MobTier::Normal
            };
            let position = chunk.tile_center(tx, ty);
            chunk
                .mobs
                .push(MobInstance::spawn(ids.next_id(), species, tier, level, position));
            break;
        }
    }
}

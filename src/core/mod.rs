//! Core primitives.
//!
//! Deterministic building blocks shared by the simulation: seeded RNG,
//! lattice value noise for terrain synthesis, world-space vectors, and the
//! spatial interest grid used to bound broadcast fan-out.

pub mod grid;
pub mod noise;
pub mod rng;
pub mod vec2;

// Re-export core types
pub use self::grid::SpatialGrid;
pub use self::noise::fbm;
pub use self::rng::{derive_zone_seed, DeterministicRng};
pub use self::vec2::Vec2;

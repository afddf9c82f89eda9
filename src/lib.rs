//! # Emberfall Zone Server
//!
//! Authoritative simulation core for Emberfall, a persistent-world action
//! RPG. One process owns one zone: it holds the world state, advances it on
//! a fixed cadence, resolves combat and loot, validates client input, and
//! hands sessions over to neighboring zone processes at boundary crossings.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EMBERFALL ZONE SERVER                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── vec2.rs     - World-space 2D vectors                    │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  ├── noise.rs    - Value noise + fBm terrain synthesis       │
//! │  └── grid.rs     - Spatial interest grid (AOI)               │
//! │                                                              │
//! │  game/           - Simulation (synchronous, single-writer)   │
//! │  ├── state.rs    - Zone world, players, clock, scheduler     │
//! │  ├── tick.rs     - Fixed-cadence tick + input handler        │
//! │  ├── chunk.rs    - Lazy procedural chunks                    │
//! │  ├── mobs.rs     - Species table, tiers, instances           │
//! │  ├── ai.rs       - Attack state machine                      │
//! │  ├── stats.rs    - Combat math + CR gate                     │
//! │  ├── loot.rs     - Smart-loot rolls                          │
//! │  └── validate.rs - Anti-cheat pre-conditions                 │
//! │                                                              │
//! │  network/        - Gateway (async, non-deterministic)        │
//! │  ├── gateway.rs  - WebSocket front door                      │
//! │  ├── auth.rs     - Signed-token verification                 │
//! │  ├── session.rs  - Session registry + AOI broadcast          │
//! │  ├── zone.rs     - Zone table + transfer tickets             │
//! │  └── protocol.rs - Wire message types                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Guarantee
//!
//! All mutation of a `ZoneWorld` funnels through one write lock: the tick
//! driver takes it once per 100 ms step, and the gateway's input path takes
//! it per accepted action between ticks. There is no intra-tick parallelism;
//! capacity scales by running more zone processes, not more threads.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::grid::SpatialGrid;
pub use crate::core::rng::DeterministicRng;
pub use crate::core::vec2::Vec2;
pub use crate::game::state::{PlayerState, ZoneWorld};
pub use crate::game::tick::{handle_player_input, tick};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 10;

/// Milliseconds per simulation tick
pub const TICK_INTERVAL_MS: u64 = 100;

//! Emberfall Zone Server
//!
//! Boots one zone process end to end: tracing, config from the
//! environment, a character store, the 10 Hz tick driver, and the
//! WebSocket gateway.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use emberfall::core::rng::derive_zone_seed;
use emberfall::core::vec2::Vec2;
use emberfall::game::character::{Archetype, CharacterRecord, MemoryCharacterStore};
use emberfall::game::state::ZoneWorld;
use emberfall::network::gateway::{GatewayConfig, ZoneGateway};
use emberfall::network::zone::{ZoneTable, ZONE_EXTENT};
use emberfall::{TICK_RATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Emberfall Zone Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = GatewayConfig::from_env();
    let zone_id = config.zone_id;

    let world_seed: u64 = std::env::var("WORLD_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0xE38E_55D1);
    let seed = derive_zone_seed(world_seed, zone_id);

    let zones = ZoneTable::default_grid(
        &std::env::var("ZONE_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
        std::env::var("ZONE_BASE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9000),
    );
    let spawn_point = zones
        .get(zone_id)
        .map(|z| {
            Vec2::new(
                (z.bounds.min_x + z.bounds.max_x) / 2.0,
                (z.bounds.min_y + z.bounds.max_y) / 2.0,
            )
        })
        .unwrap_or(Vec2::new(ZONE_EXTENT / 2.0, ZONE_EXTENT / 2.0));

    info!(zone_id, seed, ?spawn_point, "zone configured");

    // Stand-in for the external account service. A demo character is
    // seeded so a client can connect immediately; its id is logged.
    let store = Arc::new(MemoryCharacterStore::new());
    let mut demo = CharacterRecord::new("Wayfarer", Archetype::Warrior);
    demo.admin = true;
    let demo_id = store.insert(demo);
    info!(%demo_id, "seeded demo character");

    let world = Arc::new(RwLock::new(ZoneWorld::new(zone_id, seed, spawn_point)));

    let tick_driver = ZoneGateway::spawn_tick_driver(world.clone());

    let gateway = ZoneGateway::new(config, zones, world, store);
    let result = gateway.run().await.context("gateway terminated");

    tick_driver.abort();
    result
}

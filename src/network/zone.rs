//! Zone Table & Transfer Tickets
//!
//! Static zone records (id, endpoint, rectangular world-space bounds) and
//! the one-time tickets that authorize a handover reconnection to a
//! neighboring zone process.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::vec2::Vec2;

/// World-units per zone edge in the default layout.
pub const ZONE_EXTENT: f32 = 512.0;

/// Default ticket time-to-live.
pub const TICKET_TTL_SECS: i64 = 30;

// =============================================================================
// ZONE RECORDS
// =============================================================================

/// Rectangular world-space bounds, inclusive of min, exclusive of max.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl ZoneBounds {
    /// Whether a position falls inside these bounds.
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= self.min_x && pos.x < self.max_x && pos.y >= self.min_y && pos.y < self.max_y
    }
}

/// Static configuration for one zone process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub id: u16,
    pub host: String,
    pub port: u16,
    pub bounds: ZoneBounds,
}

/// The static table of all zones in the world.
#[derive(Clone, Debug)]
pub struct ZoneTable {
    zones: Vec<ZoneRecord>,
}

impl ZoneTable {
    /// Build a table from explicit records.
    pub fn new(zones: Vec<ZoneRecord>) -> Self {
        Self { zones }
    }

    /// Default 2x2 grid layout on one host, ports ascending from `base_port`.
    pub fn default_grid(host: &str, base_port: u16) -> Self {
        let mut zones = Vec::new();
        for gy in 0..2u16 {
            for gx in 0..2u16 {
                let id = gy * 2 + gx;
                zones.push(ZoneRecord {
                    id,
                    host: host.to_string(),
                    port: base_port + id,
                    bounds: ZoneBounds {
                        min_x: gx as f32 * ZONE_EXTENT,
                        min_y: gy as f32 * ZONE_EXTENT,
                        max_x: (gx + 1) as f32 * ZONE_EXTENT,
                        max_y: (gy + 1) as f32 * ZONE_EXTENT,
                    },
                });
            }
        }
        Self { zones }
    }

    /// Look up a zone by id.
    pub fn get(&self, id: u16) -> Option<&ZoneRecord> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// The zone whose bounds contain a position, if any.
    pub fn zone_at(&self, pos: Vec2) -> Option<&ZoneRecord> {
        self.zones.iter().find(|z| z.bounds.contains(pos))
    }

    /// All zone records.
    pub fn zones(&self) -> &[ZoneRecord] {
        &self.zones
    }
}

// =============================================================================
// TRANSFER TICKETS
// =============================================================================

/// A one-time transfer ticket authorizing a handover reconnection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferTicket {
    /// Opaque ticket value (hex)
    pub ticket: String,
    /// Character being transferred
    pub char_id: Uuid,
    pub from_zone: u16,
    pub to_zone: u16,
    /// Position at the boundary crossing, carried into the target zone
    pub entry_position: Vec2,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TransferTicket {
    /// Whether the ticket is still within its TTL.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Registry of outstanding tickets. Issue on handover, consume exactly
/// once on the reconnection, sweep the rest after expiry.
#[derive(Debug)]
pub struct TicketRegistry {
    ttl: Duration,
    outstanding: BTreeMap<String, TransferTicket>,
}

impl Default for TicketRegistry {
    fn default() -> Self {
        Self::new(Duration::seconds(TICKET_TTL_SECS))
    }
}

impl TicketRegistry {
    /// Create a registry with the given ticket TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            outstanding: BTreeMap::new(),
        }
    }

    /// Issue a ticket for a boundary crossing.
    pub fn issue(
        &mut self,
        char_id: Uuid,
        from_zone: u16,
        to_zone: u16,
        entry_position: Vec2,
    ) -> TransferTicket {
        let now = Utc::now();
        let ticket = TransferTicket {
            ticket: hex::encode(Uuid::new_v4().as_bytes()),
            char_id,
            from_zone,
            to_zone,
            entry_position,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.outstanding.insert(ticket.ticket.clone(), ticket.clone());
        ticket
    }

    /// Consume a ticket. Succeeds at most once per ticket, and only for
    /// the character it was issued to while still within its TTL.
    pub fn consume(&mut self, ticket: &str, char_id: &Uuid) -> Option<TransferTicket> {
        let entry = self.outstanding.remove(ticket)?;
        if entry.char_id != *char_id || !entry.is_valid_at(Utc::now()) {
            return None;
        }
        Some(entry)
    }

    /// Drop expired tickets. Returns how many were reclaimed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.outstanding.len();
        self.outstanding.retain(|_, t| t.is_valid_at(now));
        before - self.outstanding.len()
    }

    /// Outstanding ticket count.
    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether no tickets are outstanding.
    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains_half_open() {
        let bounds = ZoneBounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 512.0,
            max_y: 512.0,
        };
        assert!(bounds.contains(Vec2::new(0.0, 0.0)));
        assert!(bounds.contains(Vec2::new(511.9, 511.9)));
        assert!(!bounds.contains(Vec2::new(512.0, 0.0)));
        assert!(!bounds.contains(Vec2::new(-0.1, 0.0)));
    }

    #[test]
    fn test_default_grid_partitions_without_overlap() {
        let table = ZoneTable::default_grid("localhost", 9000);
        assert_eq!(table.zones().len(), 4);

        // Every point maps to exactly one zone
        for (x, y, expected) in [
            (10.0, 10.0, 0u16),
            (600.0, 10.0, 1),
            (10.0, 600.0, 2),
            (600.0, 600.0, 3),
        ] {
            let zone = table.zone_at(Vec2::new(x, y)).unwrap();
            assert_eq!(zone.id, expected);
        }

        // Outside the world: no zone
        assert!(table.zone_at(Vec2::new(-5.0, 0.0)).is_none());
        assert!(table.zone_at(Vec2::new(2000.0, 0.0)).is_none());
    }

    #[test]
    fn test_ticket_issue_and_single_consume() {
        let mut registry = TicketRegistry::default();
        let char_id = Uuid::new_v4();

        let ticket = registry.issue(char_id, 0, 1, Vec2::new(512.0, 100.0));
        assert_eq!(registry.len(), 1);

        let consumed = registry.consume(&ticket.ticket, &char_id).unwrap();
        assert_eq!(consumed.to_zone, 1);
        assert_eq!(consumed.entry_position, Vec2::new(512.0, 100.0));

        // One-time: second consume fails
        assert!(registry.consume(&ticket.ticket, &char_id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ticket_bound_to_character() {
        let mut registry = TicketRegistry::default();
        let owner = Uuid::new_v4();
        let thief = Uuid::new_v4();

        let ticket = registry.issue(owner, 0, 1, Vec2::ZERO);
        assert!(registry.consume(&ticket.ticket, &thief).is_none());
        // A failed consume still burns the ticket (anti-replay)
        assert!(registry.consume(&ticket.ticket, &owner).is_none());
    }

    #[test]
    fn test_expired_tickets_swept() {
        let mut registry = TicketRegistry::new(Duration::seconds(-1));
        registry.issue(Uuid::new_v4(), 0, 1, Vec2::ZERO);

        assert_eq!(registry.sweep_expired(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_ticket_rejected() {
        let mut registry = TicketRegistry::default();
        assert!(registry.consume("no-such-ticket", &Uuid::new_v4()).is_none());
    }
}

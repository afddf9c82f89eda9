//! Player Session Management
//!
//! Gateway-side registry of live connections: who is connected, where they
//! are, and which spatial-grid cell they occupy. All grid and session
//! mutation funnels through this single-writer boundary.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::core::grid::SpatialGrid;
use crate::core::vec2::Vec2;
use crate::network::protocol::{MovePayload, ServerMessage};

/// Spatial-grid cell size for interest management (world units).
pub const AOI_CELL_SIZE: f32 = 32.0;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Normal play in this zone.
    Active,
    /// A handover redirect was sent; the session is retained only until
    /// the client reconnects to the target zone or the timeout reclaims it.
    PendingHandover { to_zone: u16, since: Instant },
}

/// One connected, authenticated player.
#[derive(Debug)]
pub struct PlayerSession {
    /// Account-service user id (from the token subject)
    pub user_id: Uuid,
    /// Character id being played
    pub char_id: Uuid,
    /// Zone this gateway owns
    pub zone_id: u16,
    /// Last accepted position
    pub position: Vec2,
    /// Instant of the last accepted movement (dt source for validation)
    pub last_move: Instant,
    pub phase: SessionPhase,
    /// Outbound message channel to this client
    pub sender: mpsc::Sender<ServerMessage>,
    pub connected_at: Instant,
}

/// Registry of live sessions plus the interest grid.
pub struct SessionManager {
    sessions: RwLock<BTreeMap<Uuid, PlayerSession>>,
    grid: RwLock<SpatialGrid>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            grid: RwLock::new(SpatialGrid::new(AOI_CELL_SIZE)),
        }
    }

    /// Register an authenticated session and add it to the grid.
    pub async fn register(&self, session: PlayerSession) {
        let char_id = session.char_id;
        let pos = session.position;
        self.sessions.write().await.insert(char_id, session);
        self.grid.write().await.add_entity(char_id, pos.x, pos.y);
    }

    /// Remove a session and its grid entry.
    pub async fn unregister(&self, char_id: &Uuid) -> Option<PlayerSession> {
        let session = self.sessions.write().await.remove(char_id);
        if session.is_some() {
            self.grid.write().await.remove_entity(char_id);
        }
        session
    }

    /// Update a session's position and grid membership. Returns the
    /// measured time since the previous accepted movement.
    pub async fn update_position(&self, char_id: &Uuid, pos: Vec2) -> Option<Duration> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(char_id)?;
        let dt = session.last_move.elapsed();
        session.position = pos;
        session.last_move = Instant::now();
        drop(sessions);

        self.grid.write().await.update_entity(*char_id, pos.x, pos.y);
        Some(dt)
    }

    /// Time since the session's last accepted movement.
    pub async fn time_since_last_move(&self, char_id: &Uuid) -> Option<Duration> {
        self.sessions
            .read()
            .await
            .get(char_id)
            .map(|s| s.last_move.elapsed())
    }

    /// Mark a session as awaiting handover completion.
    pub async fn mark_pending_handover(&self, char_id: &Uuid, to_zone: u16) {
        if let Some(session) = self.sessions.write().await.get_mut(char_id) {
            session.phase = SessionPhase::PendingHandover {
                to_zone,
                since: Instant::now(),
            };
        }
    }

    /// Whether a session is pending handover.
    pub async fn is_pending_handover(&self, char_id: &Uuid) -> bool {
        matches!(
            self.sessions.read().await.get(char_id).map(|s| s.phase),
            Some(SessionPhase::PendingHandover { .. })
        )
    }

    /// Sessions whose pending handover exceeded the timeout. The caller
    /// reclaims them (world removal + checkpoint).
    pub async fn stale_handovers(&self, timeout: Duration) -> Vec<Uuid> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| match s.phase {
                SessionPhase::PendingHandover { since, .. } => since.elapsed() > timeout,
                SessionPhase::Active => false,
            })
            .map(|s| s.char_id)
            .collect()
    }

    /// Interest set for a position: everyone in the 3x3 cell neighborhood.
    pub async fn interest_set(&self, pos: Vec2) -> Vec<Uuid> {
        self.grid.read().await.get_nearby_entities(pos.x, pos.y)
    }

    /// Send a message to one session, if connected.
    pub async fn send_to(&self, char_id: &Uuid, message: ServerMessage) {
        let sender = self
            .sessions
            .read()
            .await
            .get(char_id)
            .map(|s| s.sender.clone());
        if let Some(sender) = sender {
            let _ = sender.send(message).await;
        }
    }

    /// Broadcast a player's position to its interest set (excluding the
    /// mover). Fan-out is bounded by local density, not total population.
    pub async fn broadcast_position(&self, char_id: &Uuid, pos: Vec2) {
        let interested = self.interest_set(pos).await;
        let senders: Vec<mpsc::Sender<ServerMessage>> = {
            let sessions = self.sessions.read().await;
            interested
                .iter()
                .filter(|id| *id != char_id)
                .filter_map(|id| sessions.get(id).map(|s| s.sender.clone()))
                .collect()
        };

        let update = ServerMessage::PlayerUpdate {
            id: char_id.to_string(),
            pos: MovePayload { x: pos.x, y: pos.y },
        };
        for sender in senders {
            let _ = sender.send(update.clone()).await;
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

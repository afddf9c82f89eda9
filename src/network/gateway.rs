//! Zone Gateway
//!
//! WebSocket front door for one zone process. Accepts persistent client
//! connections, runs the auth-first handshake, ingests movement, fans out
//! position updates through the spatial interest grid, and initiates zone
//! handover at boundary crossings.
//!
//! No unauthenticated session ever exists: the first message must be a
//! valid AUTH or the connection is closed with an explicit error. After
//! the handshake, malformed frames are logged and answered without
//! closing the connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::vec2::Vec2;
use crate::game::character::CharacterStore;
use crate::game::events::PresentationEvent;
use crate::game::input::{ActionResult, PlayerAction};
use crate::game::state::ZoneWorld;
use crate::game::tick::{handle_player_input, tick, ActionOutcome};
use crate::network::auth::{validate_token, AuthConfig};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::session::{PlayerSession, SessionManager, SessionPhase};
use crate::network::zone::{TicketRegistry, ZoneTable};
use crate::TICK_INTERVAL_MS;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Zone this process owns.
    pub zone_id: u16,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How long a pending-handover session is retained before reclamation.
    pub handover_timeout: Duration,
    /// Token verification settings.
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().unwrap(),
            zone_id: 0,
            max_connections: 1000,
            handover_timeout: Duration::from_secs(30),
            auth: AuthConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("GATEWAY_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            zone_id: std::env::var("ZONE_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.zone_id),
            max_connections: defaults.max_connections,
            handover_timeout: defaults.handover_timeout,
            auth: AuthConfig::from_env(),
        }
    }
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Failed to bind to address.
    #[error("failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Everything one connection task needs, cloned out of the gateway.
struct ConnectionCtx {
    zone_id: u16,
    auth: AuthConfig,
    zones: ZoneTable,
    sessions: Arc<SessionManager>,
    tickets: Arc<Mutex<TicketRegistry>>,
    world: Arc<RwLock<ZoneWorld>>,
    store: Arc<dyn CharacterStore>,
}

/// The zone gateway.
pub struct ZoneGateway {
    config: GatewayConfig,
    zones: ZoneTable,
    sessions: Arc<SessionManager>,
    tickets: Arc<Mutex<TicketRegistry>>,
    world: Arc<RwLock<ZoneWorld>>,
    store: Arc<dyn CharacterStore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ZoneGateway {
    /// Create a gateway over an existing zone world and character store.
    pub fn new(
        config: GatewayConfig,
        zones: ZoneTable,
        world: Arc<RwLock<ZoneWorld>>,
        store: Arc<dyn CharacterStore>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            zones,
            sessions: Arc::new(SessionManager::new()),
            tickets: Arc::new(Mutex::new(TicketRegistry::default())),
            world,
            store,
            shutdown_tx,
        }
    }

    /// Spawn the fixed-cadence tick driver for a zone world.
    ///
    /// The driver holds the write lock for exactly one tick at a time;
    /// the gateway's input path interleaves between ticks on the same
    /// lock (single-writer funnel).
    pub fn spawn_tick_driver(world: Arc<RwLock<ZoneWorld>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(TICK_INTERVAL_MS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let outcome = {
                    let mut world = world.write().await;
                    tick(&mut world)
                };
                for event in &outcome.events {
                    debug!(?event, "tick event");
                }
            }
        })
    }

    /// In-process simulation boundary for the (out-of-scope) presentation
    /// layer: route an action to the input handler and checkpoint the
    /// character on level-up events.
    pub async fn handle_input(&self, player: Uuid, action: PlayerAction) -> ActionOutcome {
        let mut world = self.world.write().await;
        let outcome = handle_player_input(&mut world, player, action);
        for event in &outcome.events {
            if let PresentationEvent::LevelUp { player, .. } = event {
                if let Some(state) = world.players.get(player) {
                    self.store.checkpoint(state.to_record());
                }
            }
        }
        outcome
    }

    /// Run the gateway until shutdown.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run the accept loop on an already-bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), GatewayError> {
        info!(
            zone = self.config.zone_id,
            addr = %listener.local_addr()?,
            "zone gateway listening"
        );

        let cleanup = tokio::spawn(Self::run_cleanup_loop(
            self.sessions.clone(),
            self.tickets.clone(),
            self.world.clone(),
            self.store.clone(),
            self.config.handover_timeout,
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.sessions.session_count().await >= self.config.max_connections {
                                warn!(%addr, "connection limit reached, rejecting");
                                continue;
                            }
                            debug!(%addr, "new connection");
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => error!("accept error: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        cleanup.abort();
        Ok(())
    }

    /// Spawn a task servicing one WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = ConnectionCtx {
            zone_id: self.config.zone_id,
            auth: self.config.auth.clone(),
            zones: self.zones.clone(),
            sessions: self.sessions.clone(),
            tickets: self.tickets.clone(),
            world: self.world.clone(),
            store: self.store.clone(),
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(%addr, "websocket handshake failed: {}", e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Outbound writer task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Character id once the handshake succeeds
            let mut authenticated: Option<Uuid> = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let parsed = ClientMessage::from_json(&text);
                                if !dispatch(&ctx, &msg_tx, &mut authenticated, addr, parsed.ok()).await {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                let parsed = ClientMessage::from_bytes(&data);
                                if !dispatch(&ctx, &msg_tx, &mut authenticated, addr, parsed.ok()).await {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(%addr, "client disconnected");
                                break;
                            }
                            Some(Err(e)) => {
                                debug!(%addr, "websocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            // Session teardown first: dropping the session releases its
            // sender clone so the writer can drain and close cleanly.
            if let Some(char_id) = authenticated {
                ctx.sessions.unregister(&char_id).await;
                let record = ctx.world.write().await.remove_player(&char_id);
                if let Some(record) = record {
                    ctx.store.checkpoint(record);
                }
                info!(%addr, %char_id, "session closed");
            }

            drop(msg_tx);
            let _ = sender_task.await;
        });
    }

    /// Reclaim pending-handover sessions the client never completed, and
    /// sweep expired transfer tickets.
    async fn run_cleanup_loop(
        sessions: Arc<SessionManager>,
        tickets: Arc<Mutex<TicketRegistry>>,
        world: Arc<RwLock<ZoneWorld>>,
        store: Arc<dyn CharacterStore>,
        handover_timeout: Duration,
    ) {
        let mut ticker = interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;

            for char_id in sessions.stale_handovers(handover_timeout).await {
                if sessions.unregister(&char_id).await.is_some() {
                    if let Some(record) = world.write().await.remove_player(&char_id) {
                        store.checkpoint(record);
                    }
                    info!(%char_id, "reclaimed stale handover session");
                }
            }

            let swept = tickets.lock().await.sweep_expired();
            if swept > 0 {
                debug!(swept, "expired transfer tickets");
            }
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Live session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }
}

/// Handle one parsed (or unparseable) client message.
///
/// Returns false when the connection must close.
async fn dispatch(
    ctx: &ConnectionCtx,
    sender: &mpsc::Sender<ServerMessage>,
    authenticated: &mut Option<Uuid>,
    addr: SocketAddr,
    message: Option<ClientMessage>,
) -> bool {
    match (message, authenticated.as_ref()) {
        // Malformed frame during the handshake: explicit error, close.
        (None, None) => {
            let _ = sender
                .send(ServerMessage::Error {
                    code: ErrorCode::AuthFailed,
                    message: "expected AUTH".into(),
                })
                .await;
            false
        }
        // Malformed frame after auth: log, answer, keep the connection.
        (None, Some(_)) => {
            debug!(%addr, "malformed message");
            let _ = sender
                .send(ServerMessage::Error {
                    code: ErrorCode::InvalidMessage,
                    message: "invalid message format".into(),
                })
                .await;
            true
        }
        (Some(ClientMessage::Auth { .. }), Some(_)) => {
            let _ = sender
                .send(ServerMessage::Error {
                    code: ErrorCode::AlreadyAuthenticated,
                    message: "session already established".into(),
                })
                .await;
            true
        }
        (Some(ClientMessage::Auth { token, char_id, ticket }), None) => {
            match handle_auth(ctx, sender, &token, &char_id, ticket.as_deref()).await {
                Some(id) => {
                    *authenticated = Some(id);
                    true
                }
                // Auth handshake failure always closes the connection;
                // no partial session is ever created.
                None => false,
            }
        }
        (Some(ClientMessage::Move { .. }), None) => {
            let _ = sender
                .send(ServerMessage::Error {
                    code: ErrorCode::NotAuthenticated,
                    message: "authenticate first".into(),
                })
                .await;
            false
        }
        (Some(ClientMessage::Move { payload }), Some(&char_id)) => {
            handle_move(ctx, char_id, payload.x, payload.y).await;
            true
        }
    }
}

/// Verify the signed token, load the character, and establish a session.
/// Returns the character id on success; on failure an ERROR has been sent
/// and the caller closes the connection.
async fn handle_auth(
    ctx: &ConnectionCtx,
    sender: &mpsc::Sender<ServerMessage>,
    token: &str,
    char_id: &str,
    ticket: Option<&str>,
) -> Option<Uuid> {
    let reject = |message: &str| ServerMessage::Error {
        code: ErrorCode::AuthFailed,
        message: message.into(),
    };

    let claims = match validate_token(token, &ctx.auth) {
        Ok(claims) => claims,
        Err(e) => {
            info!("auth rejected: {}", e);
            let _ = sender.send(reject("invalid token")).await;
            return None;
        }
    };

    let Ok(char_id) = Uuid::parse_str(char_id) else {
        let _ = sender.send(reject("invalid character id")).await;
        return None;
    };

    // A handover reconnection carries a one-time ticket with the
    // boundary-crossing position.
    let entry_position: Option<Vec2> = match ticket {
        Some(t) => ctx
            .tickets
            .lock()
            .await
            .consume(t, &char_id)
            .map(|t| t.entry_position),
        None => None,
    };

    let Some(record) = ctx.store.load(&char_id) else {
        info!(%char_id, "auth rejected: unknown character");
        let _ = sender.send(reject("unknown character")).await;
        return None;
    };

    let position = {
        let mut world = ctx.world.write().await;
        if world.players.contains_key(&char_id) {
            drop(world);
            info!(%char_id, "auth rejected: already connected");
            let _ = sender.send(reject("character already connected")).await;
            return None;
        }
        world.add_player(record, entry_position);
        world.players[&char_id].position
    };

    ctx.sessions
        .register(PlayerSession {
            user_id: claims.user_id(),
            char_id,
            zone_id: ctx.zone_id,
            position,
            last_move: Instant::now(),
            phase: SessionPhase::Active,
            sender: sender.clone(),
            connected_at: Instant::now(),
        })
        .await;

    let _ = sender.send(ServerMessage::AuthOk { zone: ctx.zone_id }).await;
    info!(%char_id, zone = ctx.zone_id, "session established");
    Some(char_id)
}

/// Movement ingestion: validate through the simulation, then either
/// broadcast to the interest set or initiate a zone handover.
async fn handle_move(ctx: &ConnectionCtx, char_id: Uuid, x: f32, y: f32) {
    if ctx.sessions.is_pending_handover(&char_id).await {
        // Frozen awaiting transfer; the target zone owns movement now
        return;
    }

    let dt_ms = ctx
        .sessions
        .time_since_last_move(&char_id)
        .await
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let outcome = {
        let mut world = ctx.world.write().await;
        handle_player_input(&mut world, char_id, PlayerAction::Move { x, y, dt_ms })
    };

    // Rejected movement (over budget, dead, frozen): silent no-op
    if !matches!(outcome.result, Some(ActionResult::Moved { .. })) {
        return;
    }

    let pos = Vec2::new(x, y);
    ctx.sessions.update_position(&char_id, pos).await;

    match ctx.zones.zone_at(pos) {
        Some(target) if target.id != ctx.zone_id => {
            // Boundary crossed: one-time ticket + redirect, then wait for
            // the client's independent reconnection to the target zone.
            let ticket = ctx
                .tickets
                .lock()
                .await
                .issue(char_id, ctx.zone_id, target.id, pos);
            ctx.sessions
                .send_to(
                    &char_id,
                    ServerMessage::Handover {
                        target_host: target.host.clone(),
                        target_port: target.port,
                        ticket: ticket.ticket.clone(),
                    },
                )
                .await;
            ctx.sessions.mark_pending_handover(&char_id, target.id).await;
            info!(%char_id, from = ctx.zone_id, to = target.id, "handover initiated");
        }
        _ => {
            ctx.sessions.broadcast_position(&char_id, pos).await;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::character::{Archetype, CharacterRecord, MemoryCharacterStore};
    use crate::network::zone::ZONE_EXTENT;
    use futures_util::StreamExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    const TEST_SECRET: &str = "gateway-test-secret-0123456789ab";

    fn make_token(sub: &str) -> String {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = crate::network::auth::TokenClaims {
            sub: sub.into(),
            exp: now + 3600,
            iat: now,
            iss: None,
        };
        encode(
            &Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    /// Boot a gateway on an ephemeral port with one seeded character.
    async fn start_test_gateway() -> (SocketAddr, Uuid, Arc<ZoneGateway>, Arc<MemoryCharacterStore>)
    {
        let store = Arc::new(MemoryCharacterStore::new());
        let char_id = store.insert(CharacterRecord::new("Tester", Archetype::Warrior));

        // Spawn near the middle of zone 0 so moves stay in-zone
        let world = Arc::new(RwLock::new(ZoneWorld::new(
            0,
            42,
            Vec2::new(ZONE_EXTENT / 2.0, ZONE_EXTENT / 2.0),
        )));

        let config = GatewayConfig {
            zone_id: 0,
            auth: AuthConfig {
                secret: Some(TEST_SECRET.into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let zones = ZoneTable::default_grid("127.0.0.1", 9100);
        let gateway = Arc::new(ZoneGateway::new(config, zones, world, store.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = gateway.clone();
        tokio::spawn(async move {
            let _ = server.run_with_listener(listener).await;
        });

        (addr, char_id, gateway, store)
    }

    async fn recv_json(
        ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
    ) -> ServerMessage {
        loop {
            let frame = timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).expect("invalid server message");
            }
        }
    }

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.zone_id, 0);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.handover_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_auth_handshake_establishes_session() {
        let (addr, char_id, gateway, _store) = start_test_gateway().await;

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let auth = ClientMessage::Auth {
            token: make_token("user-1"),
            char_id: char_id.to_string(),
            ticket: None,
        };
        ws.send(Message::Text(auth.to_json().unwrap())).await.unwrap();

        let reply = recv_json(&mut ws).await;
        assert_eq!(reply, ServerMessage::AuthOk { zone: 0 });
        assert_eq!(gateway.session_count().await, 1);

        gateway.shutdown();
    }

    #[tokio::test]
    async fn test_bad_token_gets_error_and_close() {
        let (addr, char_id, gateway, _store) = start_test_gateway().await;

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let auth = ClientMessage::Auth {
            token: "forged.token.here".into(),
            char_id: char_id.to_string(),
            ticket: None,
        };
        ws.send(Message::Text(auth.to_json().unwrap())).await.unwrap();

        let reply = recv_json(&mut ws).await;
        assert!(matches!(
            reply,
            ServerMessage::Error {
                code: ErrorCode::AuthFailed,
                ..
            }
        ));

        // The gateway closes the connection after a handshake failure
        let next = timeout(Duration::from_secs(5), ws.next()).await.unwrap();
        assert!(matches!(
            next,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None
        ));
        assert_eq!(gateway.session_count().await, 0);

        gateway.shutdown();
    }

    #[tokio::test]
    async fn test_move_before_auth_is_rejected() {
        let (addr, _char_id, gateway, _store) = start_test_gateway().await;

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let msg = ClientMessage::Move {
            payload: crate::network::protocol::MovePayload { x: 1.0, y: 1.0 },
        };
        ws.send(Message::Text(msg.to_json().unwrap())).await.unwrap();

        let reply = recv_json(&mut ws).await;
        assert!(matches!(
            reply,
            ServerMessage::Error {
                code: ErrorCode::NotAuthenticated,
                ..
            }
        ));

        gateway.shutdown();
    }

    #[tokio::test]
    async fn test_movement_broadcast_to_interest_set() {
        let (addr, char_a, gateway, store) = start_test_gateway().await;

        // Seed a second character
        let char_b = store.insert(CharacterRecord::new("Neighbor", Archetype::Ranger));

        let (mut ws_a, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let (mut ws_b, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        for (ws, id, user) in [(&mut ws_a, char_a, "user-a"), (&mut ws_b, char_b, "user-b")] {
            let auth = ClientMessage::Auth {
                token: make_token(user),
                char_id: id.to_string(),
                ticket: None,
            };
            ws.send(Message::Text(auth.to_json().unwrap())).await.unwrap();
            let reply = recv_json(ws).await;
            assert!(matches!(reply, ServerMessage::AuthOk { .. }));
        }

        // Let dt accumulate so the movement budget covers the step
        tokio::time::sleep(Duration::from_millis(200)).await;

        // A small in-budget move by A must reach neighbor B
        let spawn = Vec2::new(ZONE_EXTENT / 2.0, ZONE_EXTENT / 2.0);
        let msg = ClientMessage::Move {
            payload: crate::network::protocol::MovePayload {
                x: spawn.x + 0.2,
                y: spawn.y,
            },
        };
        ws_a.send(Message::Text(msg.to_json().unwrap())).await.unwrap();

        let update = recv_json(&mut ws_b).await;
        match update {
            ServerMessage::PlayerUpdate { id, pos } => {
                assert_eq!(id, char_a.to_string());
                assert!((pos.x - (spawn.x + 0.2)).abs() < 1e-4);
            }
            other => panic!("expected PLAYER_UPDATE, got {:?}", other),
        }

        gateway.shutdown();
    }
}

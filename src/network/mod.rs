//! Network Layer
//!
//! The zone gateway: WebSocket connections, signed-token authentication,
//! session and interest management, and the zone handover protocol.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod auth;
pub mod gateway;
pub mod protocol;
pub mod session;
pub mod zone;

pub use self::auth::{validate_token, AuthConfig, AuthError, TokenClaims};
pub use self::gateway::{GatewayConfig, GatewayError, ZoneGateway};
pub use self::protocol::{ClientMessage, ErrorCode, MovePayload, ServerMessage};
pub use self::session::{PlayerSession, SessionManager, SessionPhase};
pub use self::zone::{TicketRegistry, TransferTicket, ZoneBounds, ZoneRecord, ZoneTable};

//! Protocol Messages
//!
//! Wire format for the persistent client connection. JSON text frames for
//! debugging ease, with an optional binary (bincode) path for production.

use serde::{Deserialize, Serialize};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Authentication handshake. Must be the first message on a
    /// connection; everything else is rejected until it succeeds.
    #[serde(rename_all = "camelCase")]
    Auth {
        /// Signed session token from the account service
        token: String,
        /// Character to play, owned by the token's user
        char_id: String,
        /// One-time transfer ticket when arriving via zone handover
        #[serde(default)]
        ticket: Option<String>,
    },

    /// Movement update.
    Move { payload: MovePayload },
}

/// Requested position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovePayload {
    pub x: f32,
    pub y: f32,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from gateway to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Authentication succeeded; the session is live in this zone.
    AuthOk { zone: u16 },

    /// Error notification.
    Error { code: ErrorCode, message: String },

    /// A nearby player moved.
    PlayerUpdate { id: String, pos: MovePayload },

    /// The session crossed a zone boundary: reconnect to the target
    /// zone process with the one-time ticket.
    #[serde(rename_all = "camelCase")]
    Handover {
        target_host: String,
        target_port: u16,
        ticket: String,
    },
}

/// Error codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthFailed,
    NotAuthenticated,
    AlreadyAuthenticated,
    InvalidMessage,
    Internal,
}

impl ClientMessage {
    /// Parse from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse from a binary frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to a binary frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}

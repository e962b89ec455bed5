//! # Error Types
//!
//! Error handling for the session protocol core.
//!
//! ## Error Categories
//! - **Codec Errors**: `MalformedPacket`, `OversizedPacket` (fatal to the connection)
//! - **Routing Errors**: `UnknownPacketType` (recoverable, the frame is dropped)
//! - **Session Errors**: `ProtocolViolation`, `CompatibilityRejected`
//! - **Infrastructure Errors**: I/O, persistence, configuration, lock poisoning
//!
//! Compatibility and protocol failures raised while admitting a peer are handled
//! inside the handshake processor (the peer is disconnected with a reason) and are
//! only surfaced as values for callers that want to inspect the outcome.
//!
//! ## Example Usage
//! ```rust
//! use session_protocol::error::{ProtocolError, Result};
//! use session_protocol::core::binary::BinaryReader;
//!
//! fn first_string(buf: &[u8]) -> Result<String> {
//!     let mut reader = BinaryReader::new(buf);
//!     reader.read_string()
//! }
//!
//! match first_string(&[0x05, b'a']) {
//!     Err(ProtocolError::MalformedPacket(_)) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::protocol::disconnect::DisconnectReason;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Store lock names, reported through `ProtocolError::LockPoisoned`
    pub const LOCK_PENDING: &str = "pending players";
    pub const LOCK_SYNCING: &str = "syncing players";
    pub const LOCK_CONNECTED: &str = "connected players";
    pub const LOCK_PERSISTED: &str = "persisted player data";
    pub const LOCK_OUTBOUND: &str = "connection outbound queue";
    pub const LOCK_SAVE: &str = "persisted player file";

    /// Codec errors
    pub const ERR_UNEXPECTED_EOF: &str = "Unexpected end of buffer";
    pub const ERR_VARINT_TOO_LONG: &str = "Length prefix longer than 5 bytes";
    pub const ERR_INVALID_UTF8: &str = "String is not valid UTF-8";
    pub const ERR_INVALID_BOOL: &str = "Boolean byte is neither 0 nor 1";
    pub const ERR_MISSING_TAG: &str = "Frame shorter than its type tag";

    /// Session errors
    pub const ERR_NOT_PENDING: &str = "Handshake received for a connection that is not pending";
    pub const ERR_NOT_SYNCING: &str = "Sync completion for a connection that is not syncing";
    pub const ERR_ALREADY_REGISTERED: &str = "Connection is already registered";
}

/// ProtocolError is the primary error type for all session operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u16),

    #[error("Packet type {0} is already registered")]
    DuplicateRegistration(u16),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Compatibility rejected: {0}")]
    CompatibilityRejected(DisconnectReason),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Outbound queue full")]
    Backpressure,

    #[error("No player ids left in this session")]
    PlayerIdsExhausted,

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

impl ProtocolError {
    /// Whether the connection that produced this error may keep going.
    ///
    /// Only unknown packet types are tolerated, so newer peers can send frames
    /// this host does not understand yet.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::UnknownPacketType(_))
    }

    pub(crate) fn malformed(msg: &str) -> Self {
        ProtocolError::MalformedPacket(msg.to_string())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_packets_are_recoverable() {
        assert!(ProtocolError::UnknownPacketType(42).is_recoverable());
        assert!(!ProtocolError::malformed("x").is_recoverable());
        assert!(!ProtocolError::DuplicateRegistration(1).is_recoverable());
        assert!(!ProtocolError::CompatibilityRejected(DisconnectReason::InvalidData).is_recoverable());
    }

    #[test]
    fn rejection_message_carries_reason() {
        let err = ProtocolError::CompatibilityRejected(DisconnectReason::ModIsMissing(
            "com.example.mod".into(),
        ));
        assert!(err.to_string().contains("com.example.mod"));
    }
}

//! # Protocol Layer
//!
//! Wire packets, the connection abstraction, packet dispatch, and the
//! handshake that admits peers into a session.

pub mod connection;
pub mod disconnect;
pub mod dispatcher;
pub mod handshake;
pub mod packets;

#[cfg(test)]
mod tests;

pub use connection::{Connection, ConnectionHandle, ConnectionId};
pub use disconnect::DisconnectReason;
pub use dispatcher::{Dispatcher, DispatcherBuilder, PacketProcessor};
pub use handshake::{HandshakeOutcome, HandshakeProcessor};

//! The host's view of one peer's transport channel.
//!
//! Transports own their connections; the player store and processors only hold
//! [`ConnectionHandle`]s and key their maps by [`ConnectionId`].

use crate::core::packet::Frame;
use crate::error::Result;
use crate::protocol::disconnect::DisconnectReason;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a connection for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Process-unique id for a newly accepted stream
    pub fn fresh() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Queue a frame for the peer. May fail when the peer is gone or too slow.
    fn send_frame(&self, frame: Frame) -> Result<()>;

    /// Tell the peer why, then close. Further sends fail with `ConnectionClosed`.
    fn disconnect(&self, reason: DisconnectReason);

    fn is_closed(&self) -> bool;
}

pub type ConnectionHandle = Arc<dyn Connection>;

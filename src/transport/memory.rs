//! In-process connection that records what the host sends.
//!
//! Useful for embedding the session core behind a transport that lives
//! elsewhere, and for driving the handshake in tests.

use crate::core::packet::{Frame, Packet};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connection::{Connection, ConnectionId};
use crate::protocol::disconnect::DisconnectReason;
use crate::protocol::packets::Disconnect;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct Outbox {
    frames: Vec<Frame>,
    reason: Option<DisconnectReason>,
    closed: bool,
}

#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    outbox: Mutex<Outbox>,
}

impl MemoryConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::fresh(),
            outbox: Mutex::new(Outbox::default()),
        })
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        // a panicking reader must not hide frames from the next one
        self.outbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every frame sent so far, oldest first
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.outbox().frames.clone()
    }

    /// Sent frames of type `P`, decoded
    pub fn sent<P: Packet>(&self) -> Vec<P> {
        self.outbox()
            .frames
            .iter()
            .filter(|f| f.tag == P::TAG)
            .filter_map(|f| f.decode::<P>().ok())
            .collect()
    }

    /// Drain the recorded frames
    pub fn take_frames(&self) -> Vec<Frame> {
        std::mem::take(&mut self.outbox().frames)
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.outbox().reason.clone()
    }
}

impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send_frame(&self, frame: Frame) -> Result<()> {
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned(constants::LOCK_OUTBOUND))?;
        if outbox.closed {
            return Err(ProtocolError::ConnectionClosed);
        }
        outbox.frames.push(frame);
        Ok(())
    }

    fn disconnect(&self, reason: DisconnectReason) {
        let mut outbox = self.outbox();
        if outbox.closed {
            return;
        }
        match Frame::from_packet(&Disconnect {
            reason: reason.clone(),
        }) {
            Ok(frame) => outbox.frames.push(frame),
            Err(e) => debug!(connection = %self.id, error = %e, "Could not encode disconnect"),
        }
        outbox.closed = true;
        outbox.reason = Some(reason);
    }

    fn is_closed(&self) -> bool {
        self.outbox().closed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::packets::PlayerLeft;

    #[test]
    fn test_records_and_closes() {
        let conn = MemoryConnection::new();
        let left = PlayerLeft {
            player_id: 3,
            username: "Ada".into(),
        };
        conn.send_frame(Frame::from_packet(&left).unwrap()).unwrap();
        conn.disconnect(DisconnectReason::InvalidData);
        conn.disconnect(DisconnectReason::Backpressure);

        assert!(conn.is_closed());
        assert_eq!(conn.disconnect_reason(), Some(DisconnectReason::InvalidData));
        assert_eq!(conn.sent::<PlayerLeft>(), vec![left]);
        assert_eq!(conn.sent::<Disconnect>().len(), 1);
        assert!(matches!(
            conn.send_frame(Frame::new(4, vec![])),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(MemoryConnection::new().id(), MemoryConnection::new().id());
    }
}

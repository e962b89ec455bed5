// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::config::VersionPolicy;
use crate::core::binary::BinaryWriter;
use crate::core::packet::{Frame, Packet};
use crate::error::ProtocolError;
use crate::protocol::connection::{Connection, ConnectionHandle};
use crate::protocol::disconnect::DisconnectReason;
use crate::protocol::dispatcher::{Dispatcher, PacketProcessor};
use crate::protocol::handshake::HandshakeProcessor;
use crate::protocol::packets::*;
use crate::session::host::{HostSimulation, WorldSession};
use crate::session::mods::{ModDescriptor, ModRegistry};
use crate::session::player::{MechaColor, PlayerState, TechBonuses};
use crate::session::store::PlayerStore;
use crate::transport::memory::MemoryConnection;
use crate::utils::metrics::SessionMetrics;
use std::sync::Arc;

struct QuietWorld;

impl WorldSession for QuietWorld {
    fn on_player_joining(&self) {}
}

struct FixedSim;

impl HostSimulation for FixedSim {
    fn game_version_sig(&self) -> u64 {
        0xDEAD_BEEF
    }

    fn galaxy(&self) -> GalaxyDescription {
        GalaxyDescription::default()
    }

    fn current_tech_bonuses(&self, _player_id: u16) -> TechBonuses {
        TechBonuses::default()
    }
}

fn wired() -> (Arc<PlayerStore>, Arc<SessionMetrics>, Dispatcher) {
    let store = Arc::new(PlayerStore::new());
    let metrics = Arc::new(SessionMetrics::new());
    let mut mods = ModRegistry::new(VersionPolicy::Exact);
    mods.register_multiplayer("dev.core", "2.1").unwrap();

    let handshake: Arc<dyn PacketProcessor<HandshakeRequest>> = Arc::new(HandshakeProcessor::new(
        store.clone(),
        Arc::new(mods),
        Arc::new(QuietWorld),
        Arc::new(FixedSim),
        metrics.clone(),
    ));
    let dispatcher = Dispatcher::builder(metrics.clone())
        .register(handshake)
        .expect("first registration")
        .build();
    (store, metrics, dispatcher)
}

fn hello(username: &str) -> HandshakeRequest {
    HandshakeRequest {
        mods: vec![ModDescriptor::new("dev.core", "2.1")],
        game_version_sig: 0xDEAD_BEEF,
        client_cert: username.as_bytes().to_vec(),
        username: username.to_string(),
        mecha_color: MechaColor::default(),
    }
}

#[test]
fn test_handshake_through_dispatcher() {
    let (store, metrics, dispatcher) = wired();
    let mem = MemoryConnection::new();
    let conn: ConnectionHandle = mem.clone();
    store.accept(conn.clone()).unwrap();

    let raw = Frame::from_packet(&hello("Ada")).unwrap().to_bytes();
    dispatcher.dispatch(&conn, &raw).unwrap();

    assert_eq!(store.locate(mem.id()).unwrap(), vec![PlayerState::Syncing]);
    let response = &mem.sent::<HandshakeResponse>()[0];
    assert_eq!(response.player.username, "Ada");
    assert!(response.is_new_user);

    let snap = metrics.snapshot();
    assert_eq!(snap.packets_dispatched, 1);
    assert_eq!(snap.handshakes_admitted, 1);
}

#[test]
fn test_truncated_handshake_disconnects_invalid_data() {
    let (store, metrics, dispatcher) = wired();
    let mem = MemoryConnection::new();
    let conn: ConnectionHandle = mem.clone();
    store.accept(conn.clone()).unwrap();

    let mut raw = Frame::from_packet(&hello("Ada")).unwrap().to_bytes();
    raw.truncate(raw.len() - 5);

    assert!(matches!(
        dispatcher.dispatch(&conn, &raw),
        Err(ProtocolError::MalformedPacket(_))
    ));
    assert_eq!(mem.disconnect_reason(), Some(DisconnectReason::InvalidData));
    // decoding failed before the processor ran, so the record is still pending
    assert_eq!(store.locate(mem.id()).unwrap(), vec![PlayerState::Pending]);
    assert_eq!(metrics.snapshot().packets_malformed, 1);
}

#[test]
fn test_unknown_tag_keeps_connection() {
    let (store, metrics, dispatcher) = wired();
    let mem = MemoryConnection::new();
    let conn: ConnectionHandle = mem.clone();
    store.accept(conn.clone()).unwrap();

    let err = dispatcher.dispatch(&conn, &[0xFF, 0x7F, 1, 2, 3]).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownPacketType(0x7FFF)));
    assert!(err.is_recoverable());
    assert!(!mem.is_closed());
    assert!(mem.sent_frames().is_empty());
    assert_eq!(metrics.snapshot().packets_unknown, 1);
}

#[test]
fn test_trailing_bytes_are_tolerated() {
    let (store, _, dispatcher) = wired();
    let mem = MemoryConnection::new();
    let conn: ConnectionHandle = mem.clone();
    store.accept(conn.clone()).unwrap();

    let mut writer = BinaryWriter::new();
    hello("Ada").encode(&mut writer).unwrap();
    writer.write_u32(0xABCD);
    let frame = Frame::new(HandshakeRequest::TAG, writer.finish());

    dispatcher.dispatch_frame(&conn, &frame).unwrap();
    assert!(!mem.is_closed());
}

#[test]
fn test_second_handshake_is_rejected() {
    let (store, _, dispatcher) = wired();
    let mem = MemoryConnection::new();
    let conn: ConnectionHandle = mem.clone();
    store.accept(conn.clone()).unwrap();

    let raw = Frame::from_packet(&hello("Ada")).unwrap().to_bytes();
    dispatcher.dispatch(&conn, &raw).unwrap();
    let persisted = store.persisted().len().unwrap();

    dispatcher.dispatch(&conn, &raw).unwrap();
    assert_eq!(mem.disconnect_reason(), Some(DisconnectReason::InvalidData));
    assert_eq!(store.locate(mem.id()).unwrap(), vec![PlayerState::Syncing]);
    assert_eq!(store.persisted().len().unwrap(), persisted);
    assert_eq!(mem.sent::<HandshakeResponse>().len(), 1);
}

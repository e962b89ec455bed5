//! Registering extra packet processors alongside the handshake

#![allow(clippy::expect_used, clippy::unwrap_used)]

use session_protocol::config::{SessionConfig, VersionPolicy};
use session_protocol::core::binary::{BinaryReader, BinaryWriter};
use session_protocol::protocol::dispatcher::PacketProcessor;
use session_protocol::protocol::packets::HandshakeRequest;
use session_protocol::transport::memory::MemoryConnection;
use session_protocol::{
    ConnectionHandle, Frame, GalaxyDescription, HostSimulation, ModRegistry, Packet,
    ProtocolError, SessionHost, TechBonuses, WorldSession,
};
use std::sync::{Arc, Mutex};

struct World;
impl WorldSession for World {
    fn on_player_joining(&self) {}
}

struct Sim;
impl HostSimulation for Sim {
    fn game_version_sig(&self) -> u64 {
        1
    }
    fn galaxy(&self) -> GalaxyDescription {
        GalaxyDescription::default()
    }
    fn current_tech_bonuses(&self, _: u16) -> TechBonuses {
        TechBonuses::default()
    }
}

/// A chat line, as a downstream crate would add one
#[derive(Debug, Clone, PartialEq)]
struct ChatMessage {
    text: String,
}

impl Packet for ChatMessage {
    const TAG: u16 = 100;
    const NAME: &'static str = "ChatMessage";

    fn encode(&self, writer: &mut BinaryWriter) -> session_protocol::Result<()> {
        writer.write_string(&self.text);
        Ok(())
    }

    fn decode(reader: &mut BinaryReader<'_>) -> session_protocol::Result<Self> {
        Ok(Self {
            text: reader.read_string()?,
        })
    }
}

#[derive(Default)]
struct ChatLog {
    lines: Mutex<Vec<String>>,
}

impl PacketProcessor<ChatMessage> for ChatLog {
    fn process(&self, packet: ChatMessage, _conn: &ConnectionHandle) -> session_protocol::Result<()> {
        self.lines.lock().unwrap().push(packet.text);
        Ok(())
    }
}

fn host_with_chat(log: Arc<ChatLog>) -> SessionHost {
    SessionHost::with_processors(
        SessionConfig::default(),
        ModRegistry::new(VersionPolicy::Exact),
        Arc::new(World),
        Arc::new(Sim),
        move |builder| builder.register::<ChatMessage>(log),
    )
    .unwrap()
}

#[test]
fn test_custom_processor_receives_packets_in_order() {
    let log = Arc::new(ChatLog::default());
    let host = host_with_chat(log.clone());
    let mem = MemoryConnection::new();
    let conn: ConnectionHandle = mem.clone();
    host.on_connect(conn.clone()).unwrap();

    for text in ["one", "two", "three"] {
        let frame = Frame::from_packet(&ChatMessage { text: text.into() }).unwrap();
        host.on_frame(&conn, &frame).unwrap();
    }

    assert_eq!(*log.lines.lock().unwrap(), vec!["one", "two", "three"]);
    assert_eq!(host.dispatcher().tags(), vec![HandshakeRequest::TAG, ChatMessage::TAG]);
}

#[test]
fn test_cannot_shadow_handshake_route() {
    let result = SessionHost::with_processors(
        SessionConfig::default(),
        ModRegistry::new(VersionPolicy::Exact),
        Arc::new(World),
        Arc::new(Sim),
        |builder| builder.register_fn::<HandshakeRequest, _>(|_, _| Ok(())),
    );
    assert!(matches!(
        result.err(),
        Some(ProtocolError::DuplicateRegistration(1))
    ));
}

#[test]
fn test_processor_error_does_not_disconnect() {
    let host = SessionHost::with_processors(
        SessionConfig::default(),
        ModRegistry::new(VersionPolicy::Exact),
        Arc::new(World),
        Arc::new(Sim),
        |builder| {
            builder.register_fn::<ChatMessage, _>(|_, _| {
                Err(ProtocolError::ProtocolViolation("chat before join".into()))
            })
        },
    )
    .unwrap();
    let mem = MemoryConnection::new();
    let conn: ConnectionHandle = mem.clone();

    let frame = Frame::from_packet(&ChatMessage { text: "hi".into() }).unwrap();
    assert!(matches!(
        host.on_frame(&conn, &frame),
        Err(ProtocolError::ProtocolViolation(_))
    ));
    assert!(mem.disconnect_reason().is_none());
}

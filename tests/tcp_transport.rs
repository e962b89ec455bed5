//! Handshakes over a real TCP listener

#![allow(clippy::expect_used, clippy::unwrap_used)]

use futures::{SinkExt, StreamExt};
use session_protocol::config::{SessionConfig, VersionPolicy};
use session_protocol::core::codec::FrameCodec;
use session_protocol::protocol::packets::{Disconnect, HandshakeRequest, HandshakeResponse};
use session_protocol::session::mods::ModDescriptor;
use session_protocol::session::player::{CertHash, MechaColor};
use session_protocol::{
    DisconnectReason, Frame, GalaxyDescription, HostSimulation, ModRegistry, Packet,
    SessionHost, TechBonuses, WorldSession,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

struct World;
impl WorldSession for World {
    fn on_player_joining(&self) {}
}

struct Sim;
impl HostSimulation for Sim {
    fn game_version_sig(&self) -> u64 {
        3
    }
    fn galaxy(&self) -> GalaxyDescription {
        GalaxyDescription {
            seed: 99,
            ..GalaxyDescription::default()
        }
    }
    fn current_tech_bonuses(&self, _: u16) -> TechBonuses {
        TechBonuses::default()
    }
}

async fn start() -> (Arc<SessionHost>, SocketAddr, mpsc::Sender<()>) {
    start_with(SessionConfig::default()).await
}

async fn start_with(config: SessionConfig) -> (Arc<SessionHost>, SocketAddr, mpsc::Sender<()>) {
    let mut mods = ModRegistry::new(VersionPolicy::Exact);
    mods.register_multiplayer("core", "1").unwrap();
    let host = Arc::new(SessionHost::new(config, mods, Arc::new(World), Arc::new(Sim)).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, shutdown) = mpsc::channel(1);
    tokio::spawn(session_protocol::transport::serve(listener, host.clone(), shutdown));
    (host, addr, stop)
}

fn hello(mods: Vec<ModDescriptor>) -> Frame {
    Frame::from_packet(&HandshakeRequest {
        mods,
        game_version_sig: 3,
        client_cert: b"tcp-client".to_vec(),
        username: "Remote".into(),
        mecha_color: MechaColor::default(),
    })
    .unwrap()
}

async fn next_frame(client: &mut Framed<TcpStream, FrameCodec>) -> Option<Frame> {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for host")
        .map(|r| r.unwrap())
}

#[tokio::test]
async fn handshake_over_tcp() {
    let (host, addr, stop) = start().await;
    let mut client = Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec::default());

    client.send(hello(vec![ModDescriptor::new("core", "1")])).await.unwrap();
    let frame = next_frame(&mut client).await.unwrap();
    assert_eq!(frame.tag, HandshakeResponse::TAG);

    let response = frame.decode::<HandshakeResponse>().unwrap();
    assert_eq!(response.galaxy.seed, 99);
    assert_eq!(response.player.username, "Remote");
    assert_eq!(host.store().syncing().len().unwrap(), 1);

    drop(client);
    stop.send(()).await.unwrap();
}

#[tokio::test]
async fn rejected_peer_is_told_why_then_closed() {
    let (host, addr, stop) = start().await;
    let mut client = Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec::default());

    client.send(hello(vec![])).await.unwrap();
    let notice = next_frame(&mut client).await.unwrap().decode::<Disconnect>().unwrap();
    assert_eq!(notice.reason, DisconnectReason::ModIsMissing("core".into()));
    assert!(next_frame(&mut client).await.is_none());

    // the host forgets the connection once its tasks wind down
    for _ in 0..50 {
        if host.metrics().snapshot().connections_active == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(host.metrics().snapshot().connections_active, 0);
    assert!(host.store().pending().is_empty().unwrap());

    stop.send(()).await.unwrap();
}

#[tokio::test]
async fn garbage_stream_is_invalid_data() {
    let (_host, addr, stop) = start().await;
    let mut client = Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec::default());

    // a tag-less frame fails the stream codec on the host side
    let mut raw = client.into_inner();
    tokio::io::AsyncWriteExt::write_all(&mut raw, &[1, 0, 0, 0, 0xAA]).await.unwrap();
    client = Framed::new(raw, FrameCodec::default());

    let notice = next_frame(&mut client).await.unwrap().decode::<Disconnect>().unwrap();
    assert_eq!(notice.reason, DisconnectReason::InvalidData);
    assert!(next_frame(&mut client).await.is_none());

    stop.send(()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn departure_over_tcp_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("players.bin");
    let mut config = SessionConfig::default();
    config.persistence.path = Some(path.to_string_lossy().into_owned());

    let (host, addr, stop) = start_with(config).await;
    let mut client = Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec::default());
    client.send(hello(vec![ModDescriptor::new("core", "1")])).await.unwrap();
    assert!(next_frame(&mut client).await.is_some());
    drop(client);

    // nothing writes the file before the departure save
    let cert = CertHash::of(b"tcp-client");
    let mut saved = false;
    for _ in 0..100 {
        if let Ok(players) = session_protocol::session::persistence::load_from_file(&path) {
            saved = players.contains_key(&cert);
            if saved {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(saved);
    assert!(host.store().syncing().is_empty().unwrap());

    stop.send(()).await.unwrap();
}

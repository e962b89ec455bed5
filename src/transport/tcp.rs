//! TCP transport for a [`SessionHost`].
//!
//! Each accepted stream gets a reader task that dispatches frames in receipt
//! order and a writer task fed by a bounded queue. A peer that lets its queue
//! fill up is disconnected with `Backpressure` instead of stalling the sender.

use crate::config::ServerConfig;
use crate::core::codec::FrameCodec;
use crate::core::packet::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::connection::{Connection, ConnectionHandle, ConnectionId};
use crate::protocol::disconnect::DisconnectReason;
use crate::protocol::packets::Disconnect;
use crate::session::host::SessionHost;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

enum Outbound {
    Frame(Frame),
    Close,
}

pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    outbound: mpsc::Sender<Outbound>,
    closing: AtomicBool,
    closed: watch::Sender<bool>,
}

impl TcpConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Stop both tasks without notifying the peer
    fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.closed.send_replace(true);
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send_frame(&self, frame: Frame) -> Result<()> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionClosed);
        }
        match self.outbound.try_send(Outbound::Frame(frame)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(connection = %self.id, peer = %self.peer, "Outbound queue full");
                self.disconnect(DisconnectReason::Backpressure);
                Err(ProtocolError::Backpressure)
            }
            Err(TrySendError::Closed(_)) => Err(ProtocolError::ConnectionClosed),
        }
    }

    fn disconnect(&self, reason: DisconnectReason) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(connection = %self.id, reason = %reason, "Disconnecting peer");

        // queued ahead of the close signal so the writer flushes it first
        match Frame::from_packet(&Disconnect { reason }) {
            Ok(frame) => {
                if self.outbound.try_send(Outbound::Frame(frame)).is_err() {
                    debug!(connection = %self.id, "Disconnect notice dropped");
                }
            }
            Err(e) => debug!(connection = %self.id, error = %e, "Could not encode disconnect"),
        }
        let _ = self.outbound.try_send(Outbound::Close);
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Bind the configured listen address
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let listener = TcpListener::bind(&config.address).await?;
    info!(address = %config.address, "Listening");
    Ok(listener)
}

/// Accept peers until `shutdown` fires, then wait for open connections to
/// drain (bounded by the configured shutdown timeout) and save persisted data.
#[instrument(skip_all)]
pub async fn serve(
    listener: TcpListener,
    host: Arc<SessionHost>,
    mut shutdown: mpsc::Receiver<()>,
) -> Result<()> {
    let server = host.config().server.clone();
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Shutting down server. Waiting for connections to close...");
                drain(&active, server.shutdown_timeout).await;
                let saver = host.clone();
                match tokio::task::spawn_blocking(move || saver.save_persisted()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(error = %e, "Failed to save persisted players"),
                    Err(e) => error!(error = %e, "Save task failed"),
                }
                host.metrics().log_summary();
                return Ok(());
            }

            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                        continue;
                    }
                };

                if active.load(Ordering::SeqCst) >= server.max_connections {
                    warn!(peer = %peer, limit = server.max_connections, "Connection limit reached, refusing peer");
                    continue;
                }

                active.fetch_add(1, Ordering::SeqCst);
                let active = active.clone();
                let host = host.clone();
                let server = server.clone();
                tokio::spawn(async move {
                    handle_stream(stream, peer, host, &server).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
    }
}

async fn drain(active: &AtomicUsize, timeout: Duration) {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        let connections = active.load(Ordering::SeqCst);
        if connections == 0 {
            info!("All connections closed, shutting down");
            return;
        }
        tokio::select! {
            _ = &mut deadline => {
                warn!(connections, "Shutdown timeout reached, forcing exit");
                return;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                debug!(connections, "Waiting for connections to close");
            }
        }
    }
}

async fn handle_stream(stream: TcpStream, peer: SocketAddr, host: Arc<SessionHost>, server: &ServerConfig) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "Could not set TCP_NODELAY");
    }

    let (sink, mut frames) = Framed::new(stream, FrameCodec::new(server.max_frame_size)).split();
    let (outbound, queue) = mpsc::channel(server.backpressure_limit);
    let (closed, mut reader_closed) = watch::channel(false);
    let writer_closed = closed.subscribe();

    let conn = Arc::new(TcpConnection {
        id: ConnectionId::fresh(),
        peer,
        outbound,
        closing: AtomicBool::new(false),
        closed,
    });
    let handle: ConnectionHandle = conn.clone();

    if let Err(e) = host.on_connect(handle.clone()) {
        warn!(peer = %peer, error = %e, "Rejecting connection");
        return;
    }
    info!(connection = %conn.id, peer = %peer, "Peer connected");

    let mut writer = tokio::spawn(write_loop(sink, queue, writer_closed));

    loop {
        tokio::select! {
            _ = reader_closed.changed() => break,
            item = frames.next() => match item {
                Some(Ok(frame)) => {
                    if let Err(e) = host.on_frame(&handle, &frame) {
                        if !e.is_recoverable() {
                            debug!(connection = %conn.id, error = %e, "Frame handling failed");
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(connection = %conn.id, error = %e, "Unreadable stream");
                    handle.disconnect(DisconnectReason::InvalidData);
                    break;
                }
                None => break,
            },
        }
    }

    // cleanup may write the persisted file
    let id = conn.id;
    let cleanup = host.clone();
    match tokio::task::spawn_blocking(move || cleanup.on_disconnect(id)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(connection = %id, error = %e, "Cleanup after disconnect failed"),
        Err(e) => error!(connection = %id, error = %e, "Cleanup task failed"),
    }
    conn.shutdown();

    if tokio::time::timeout(server.shutdown_timeout, &mut writer).await.is_err() {
        warn!(connection = %conn.id, "Writer did not finish, aborting");
        writer.abort();
    }
    info!(connection = %conn.id, peer = %peer, "Peer disconnected");
}

async fn write_loop(
    mut sink: SplitSink<Framed<TcpStream, FrameCodec>, Frame>,
    queue: mpsc::Receiver<Outbound>,
    mut closed: watch::Receiver<bool>,
) {
    let mut queue = ReceiverStream::new(queue);
    loop {
        tokio::select! {
            biased;
            next = queue.next() => match next {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(frame).await {
                        debug!(error = %e, "Write failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => break,
            },
            _ = closed.changed() => break,
        }
    }
    let _ = sink.close().await;
}

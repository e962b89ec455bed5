//! # Packet Dispatcher
//!
//! Routes an inbound frame to the one processor registered for its tag.
//!
//! Routes are fixed at startup through [`DispatcherBuilder`]; the built
//! [`Dispatcher`] is immutable and shared freely across connection tasks.
//!
//! ## Failure handling
//! - unknown tag: logged, frame dropped, `UnknownPacketType` returned (recoverable)
//! - payload fails to decode: peer disconnected with `InvalidData`, `MalformedPacket` returned
//! - processor error: returned as-is

use crate::core::binary::BinaryReader;
use crate::core::packet::{split_tag, Frame, Packet};
use crate::error::{ProtocolError, Result};
use crate::protocol::connection::ConnectionHandle;
use crate::protocol::disconnect::DisconnectReason;
use crate::utils::metrics::{SessionMetrics, Timer};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Handles one decoded packet type
pub trait PacketProcessor<P: Packet>: Send + Sync {
    fn process(&self, packet: P, conn: &ConnectionHandle) -> Result<()>;
}

struct FnProcessor<P, F> {
    f: F,
    _packet: PhantomData<fn(P)>,
}

impl<P, F> PacketProcessor<P> for FnProcessor<P, F>
where
    P: Packet,
    F: Fn(P, &ConnectionHandle) -> Result<()> + Send + Sync,
{
    fn process(&self, packet: P, conn: &ConnectionHandle) -> Result<()> {
        (self.f)(packet, conn)
    }
}

enum RouteFailure {
    Decode(ProtocolError),
    Process(ProtocolError),
}

type RouteFn =
    dyn Fn(&mut BinaryReader<'_>, &ConnectionHandle) -> std::result::Result<(), RouteFailure>
        + Send
        + Sync;

struct Route {
    name: &'static str,
    handler: Box<RouteFn>,
}

pub struct DispatcherBuilder {
    routes: HashMap<u16, Route>,
    metrics: Arc<SessionMetrics>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new(Arc::new(SessionMetrics::new()))
    }
}

impl DispatcherBuilder {
    pub fn new(metrics: Arc<SessionMetrics>) -> Self {
        Self {
            routes: HashMap::new(),
            metrics,
        }
    }

    /// Route `P::TAG` to `processor`. Each tag may be registered once.
    pub fn register<P: Packet>(mut self, processor: Arc<dyn PacketProcessor<P>>) -> Result<Self> {
        if self.routes.contains_key(&P::TAG) {
            return Err(ProtocolError::DuplicateRegistration(P::TAG));
        }

        let handler: Box<RouteFn> = Box::new(move |reader: &mut BinaryReader<'_>, conn: &ConnectionHandle| {
            let packet = P::decode(reader).map_err(RouteFailure::Decode)?;
            if !reader.is_empty() {
                debug!(
                    packet = P::NAME,
                    trailing = reader.remaining(),
                    "Ignoring trailing bytes"
                );
            }
            processor.process(packet, conn).map_err(RouteFailure::Process)
        });

        self.routes.insert(
            P::TAG,
            Route {
                name: P::NAME,
                handler,
            },
        );
        Ok(self)
    }

    /// Route `P::TAG` to a closure
    pub fn register_fn<P, F>(self, f: F) -> Result<Self>
    where
        P: Packet,
        F: Fn(P, &ConnectionHandle) -> Result<()> + Send + Sync + 'static,
    {
        self.register::<P>(Arc::new(FnProcessor {
            f,
            _packet: PhantomData,
        }))
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            routes: self.routes,
            metrics: self.metrics,
        }
    }
}

pub struct Dispatcher {
    routes: HashMap<u16, Route>,
    metrics: Arc<SessionMetrics>,
}

impl Dispatcher {
    pub fn builder(metrics: Arc<SessionMetrics>) -> DispatcherBuilder {
        DispatcherBuilder::new(metrics)
    }

    pub fn is_registered(&self, tag: u16) -> bool {
        self.routes.contains_key(&tag)
    }

    /// Registered tags, ascending
    pub fn tags(&self) -> Vec<u16> {
        let mut tags: Vec<u16> = self.routes.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Dispatch a raw `[tag][payload]` buffer
    pub fn dispatch(&self, conn: &ConnectionHandle, raw: &[u8]) -> Result<()> {
        match split_tag(raw) {
            Ok((tag, payload)) => self.dispatch_tagged(conn, tag, payload),
            Err(e) => {
                self.reject_malformed(conn, "untagged", &e);
                Err(e)
            }
        }
    }

    /// Dispatch a frame already split by the stream codec
    pub fn dispatch_frame(&self, conn: &ConnectionHandle, frame: &Frame) -> Result<()> {
        self.dispatch_tagged(conn, frame.tag, &frame.payload)
    }

    #[instrument(skip(self, conn, payload), fields(connection = %conn.id(), bytes = payload.len()))]
    fn dispatch_tagged(&self, conn: &ConnectionHandle, tag: u16, payload: &[u8]) -> Result<()> {
        let Some(route) = self.routes.get(&tag) else {
            self.metrics.packet_unknown();
            warn!(tag, "Dropping packet of unknown type");
            return Err(ProtocolError::UnknownPacketType(tag));
        };

        self.metrics.packet_dispatched();
        let _timer = Timer::start(route.name);
        let mut reader = BinaryReader::new(payload);
        match (route.handler)(&mut reader, conn) {
            Ok(()) => Ok(()),
            Err(RouteFailure::Decode(e)) => {
                self.reject_malformed(conn, route.name, &e);
                Err(e)
            }
            Err(RouteFailure::Process(e)) => {
                warn!(packet = route.name, error = %e, "Processor failed");
                Err(e)
            }
        }
    }

    fn reject_malformed(&self, conn: &ConnectionHandle, packet: &str, error: &ProtocolError) {
        self.metrics.packet_malformed();
        warn!(packet, error = %error, "Malformed packet, disconnecting peer");
        conn.disconnect(DisconnectReason::InvalidData);
    }
}

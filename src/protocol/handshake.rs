//! # Handshake Processor
//!
//! Admits a pending peer into the session, or rejects it with a reason.
//!
//! ```text
//! Pending ──HandshakeRequest──▶ Syncing ──sync complete──▶ Connected
//!    │                            │                           │
//!    └────────────────────────────┴───────────────────────────┴──▶ Disconnected
//! ```
//!
//! Per-session state lives in the [`PlayerStore`]; the processor itself is
//! stateless and shared by every connection task. Collaborators are injected at
//! construction.
//!
//! The record is taken out of `pending` in one critical section and held by the
//! processor until it is inserted into `syncing`, so a second request for the
//! same connection finds nothing pending and is rejected. No store lock is held
//! while sending.

use crate::core::binary::BinaryWriter;
use crate::core::packet::Frame;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connection::{ConnectionHandle, ConnectionId};
use crate::protocol::disconnect::DisconnectReason;
use crate::protocol::dispatcher::PacketProcessor;
use crate::protocol::packets::{HandshakeRequest, HandshakeResponse, PlayerJoining};
use crate::session::host::{HostSimulation, WorldSession};
use crate::session::mods::{negotiate, Compatibility, ModRegistry};
use crate::session::player::{CertHash, PlayerRecord};
use crate::session::store::PlayerStore;
use crate::utils::buffer_pool::BufferPool;
use crate::utils::metrics::{SessionMetrics, Timer};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of one handshake attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Admitted { player_id: u16, is_new_user: bool },
    Rejected(DisconnectReason),
}

impl HandshakeOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, HandshakeOutcome::Admitted { .. })
    }

    /// Admitted player id, or the rejection as an error
    pub fn into_result(self) -> Result<u16> {
        match self {
            HandshakeOutcome::Admitted { player_id, .. } => Ok(player_id),
            HandshakeOutcome::Rejected(DisconnectReason::InvalidData) => Err(
                ProtocolError::ProtocolViolation(constants::ERR_NOT_PENDING.to_string()),
            ),
            HandshakeOutcome::Rejected(reason) => Err(ProtocolError::CompatibilityRejected(reason)),
        }
    }
}

pub struct HandshakeProcessor {
    store: Arc<PlayerStore>,
    mods: Arc<ModRegistry>,
    world: Arc<dyn WorldSession>,
    host: Arc<dyn HostSimulation>,
    metrics: Arc<SessionMetrics>,
    pool: BufferPool,
}

impl HandshakeProcessor {
    pub fn new(
        store: Arc<PlayerStore>,
        mods: Arc<ModRegistry>,
        world: Arc<dyn WorldSession>,
        host: Arc<dyn HostSimulation>,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            store,
            mods,
            world,
            host,
            metrics,
            pool: BufferPool::default(),
        }
    }

    /// Run one handshake to completion.
    ///
    /// Rejections disconnect the peer and come back as
    /// [`HandshakeOutcome::Rejected`]; `Err` is reserved for store failures,
    /// which also disconnect the peer once its record has left `pending`.
    #[instrument(skip(self, packet, conn), fields(connection = %conn.id(), mods = packet.mods.len()))]
    pub fn handle(&self, packet: HandshakeRequest, conn: &ConnectionHandle) -> Result<HandshakeOutcome> {
        let _timer = Timer::start("handshake");
        self.metrics.handshake_attempt();
        let id = conn.id();

        let Some(mut record) = self.store.take_pending(id)? else {
            warn!("{}", constants::ERR_NOT_PENDING);
            return Ok(self.reject(conn, DisconnectReason::InvalidData));
        };

        if let Compatibility::Rejected(reason) = negotiate(&self.mods, &packet.mods) {
            return Ok(self.reject(conn, reason));
        }

        let host_sig = self.host.game_version_sig();
        if packet.game_version_sig != host_sig {
            return Ok(self.reject(
                conn,
                DisconnectReason::GameVersionMismatch {
                    peer_sig: packet.game_version_sig,
                    host_sig,
                },
            ));
        }

        self.world.on_player_joining();

        record.data.player_id = match self.store.assign_player_id() {
            Ok(player_id) => player_id,
            Err(e) => {
                warn!(error = %e, "Cannot admit player");
                return Ok(self.reject(conn, DisconnectReason::SessionFull));
            }
        };
        let hash = CertHash::of(&packet.client_cert);
        let is_new_user = self
            .resolve_identity(&mut record, &hash, &packet)
            .map_err(|e| self.abandon(conn, e))?;
        record.cert_hash = Some(hash);

        self.announce(id, &record);

        record.data.mecha.tech_bonuses = self.host.current_tech_bonuses(record.id());
        let inserted = self
            .store
            .syncing()
            .add(id, record.clone())
            .map_err(|e| self.abandon(conn, e))?;
        if !inserted {
            // the record was held exclusively since take_pending
            conn.disconnect(DisconnectReason::InvalidData);
            return Err(ProtocolError::ProtocolViolation(format!(
                "{}: {id}",
                constants::ERR_ALREADY_REGISTERED
            )));
        }

        let response = self
            .build_response(&record, is_new_user)
            .map_err(|e| self.abandon(conn, e))?;
        if let Err(e) = conn.send_frame(response) {
            warn!(error = %e, "Failed to send handshake response");
        }

        self.metrics.handshake_admitted();
        info!(
            player_id = record.id(),
            username = %record.data.username,
            is_new_user,
            "Player admitted, syncing"
        );
        Ok(HandshakeOutcome::Admitted {
            player_id: record.id(),
            is_new_user,
        })
    }

    fn reject(&self, conn: &ConnectionHandle, reason: DisconnectReason) -> HandshakeOutcome {
        self.metrics.handshake_rejected();
        info!(reason = %reason, "Handshake rejected");
        conn.disconnect(reason.clone());
        HandshakeOutcome::Rejected(reason)
    }

    /// Drop a peer whose handshake failed inside the host
    fn abandon(&self, conn: &ConnectionHandle, error: ProtocolError) -> ProtocolError {
        self.metrics.handshake_rejected();
        warn!(error = %error, "Handshake aborted");
        conn.disconnect(DisconnectReason::InvalidData);
        error
    }

    /// Load a returning player's data or record a new baseline, then apply the
    /// peer's display fields. One critical section on `persisted`.
    fn resolve_identity(
        &self,
        record: &mut PlayerRecord,
        hash: &CertHash,
        packet: &HandshakeRequest,
    ) -> Result<bool> {
        let mut persisted = self.store.persisted().lock()?;
        let saved = persisted.get(hash).cloned();
        let is_new_user = saved.is_none();
        if let Some(saved) = saved {
            debug!(cert = %hash, "Returning player");
            record.load_user_data(saved);
        }

        record.apply_username(&packet.username);
        record.data.mecha_color = packet.mecha_color;

        if is_new_user {
            persisted.insert(hash.clone(), record.data.clone());
        }
        Ok(is_new_user)
    }

    /// Tell every connected peer about the newcomer. Runs before the newcomer
    /// enters `syncing`, so it can never be among the recipients.
    fn announce(&self, joining: ConnectionId, record: &PlayerRecord) {
        let recipients = match self.store.connected().snapshot() {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(error = %e, "Skipping join broadcast");
                return;
            }
        };

        let frame = match Frame::from_packet_pooled(
            &PlayerJoining {
                player: record.data.public_copy(),
            },
            &self.pool,
        ) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode join broadcast");
                return;
            }
        };

        for (peer_id, peer) in recipients.iter().filter(|(peer_id, _)| *peer_id != joining) {
            if let Err(e) = peer.connection.send_frame(frame.clone()) {
                debug!(peer = %peer_id, error = %e, "Join broadcast not delivered");
            }
        }
    }

    fn build_response(&self, record: &PlayerRecord, is_new_user: bool) -> Result<Frame> {
        let mut settings = BinaryWriter::pooled(&self.pool);
        let mod_settings_count = self.mods.export_settings(&mut settings)?;

        let response = HandshakeResponse {
            galaxy: self.host.galaxy(),
            is_new_user,
            player: record.data.clone(),
            mod_settings: settings.finish(),
            mod_settings_count,
        };
        Frame::from_packet_pooled(&response, &self.pool)
    }
}

impl PacketProcessor<HandshakeRequest> for HandshakeProcessor {
    fn process(&self, packet: HandshakeRequest, conn: &ConnectionHandle) -> Result<()> {
        self.handle(packet, conn).map(|_| ())
    }
}

//! # Session Host
//!
//! Wires the store, mod registry, dispatcher and handshake processor together
//! and exposes the lifecycle callbacks a transport drives:
//!
//! - [`SessionHost::on_connect`]: new stream, registered as pending
//! - [`SessionHost::on_frame`] / [`SessionHost::on_packet`]: inbound data, in receipt order
//! - [`SessionHost::on_sync_complete`]: world sync finished, syncing to connected
//! - [`SessionHost::on_disconnect`]: stream gone, record dropped from every store

use crate::config::SessionConfig;
use crate::core::packet::Frame;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connection::{ConnectionHandle, ConnectionId};
use crate::protocol::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::protocol::handshake::HandshakeProcessor;
use crate::protocol::packets::{GalaxyDescription, HandshakeRequest, PlayerLeft};
use crate::session::mods::ModRegistry;
use crate::session::persistence;
use crate::session::player::{PlayerState, TechBonuses};
use crate::session::store::PlayerStore;
use crate::utils::metrics::SessionMetrics;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Simulation-side bookkeeping hooks
pub trait WorldSession: Send + Sync {
    /// A validated peer is about to receive its state snapshot
    fn on_player_joining(&self);

    fn on_player_left(&self, _player_id: u16) {}
}

/// Read access to the host's own game state
pub trait HostSimulation: Send + Sync {
    fn game_version_sig(&self) -> u64;

    fn galaxy(&self) -> GalaxyDescription;

    fn current_tech_bonuses(&self, player_id: u16) -> TechBonuses;
}

pub struct SessionHost {
    config: SessionConfig,
    store: Arc<PlayerStore>,
    world: Arc<dyn WorldSession>,
    dispatcher: Dispatcher,
    metrics: Arc<SessionMetrics>,
    save_lock: Mutex<()>,
}

impl SessionHost {
    pub fn new(
        config: SessionConfig,
        mods: ModRegistry,
        world: Arc<dyn WorldSession>,
        simulation: Arc<dyn HostSimulation>,
    ) -> Result<Self> {
        Self::with_processors(config, mods, world, simulation, Ok)
    }

    /// Build a host whose dispatcher also routes the packets `extend` registers
    pub fn with_processors<F>(
        config: SessionConfig,
        mods: ModRegistry,
        world: Arc<dyn WorldSession>,
        simulation: Arc<dyn HostSimulation>,
        extend: F,
    ) -> Result<Self>
    where
        F: FnOnce(DispatcherBuilder) -> Result<DispatcherBuilder>,
    {
        config.validate_strict()?;

        let store = match &config.persistence.path {
            Some(path) => {
                let saved = persistence::load_or_default(path)?;
                info!(path = %path, players = saved.len(), "Loaded persisted players");
                PlayerStore::with_persisted(saved)?
            }
            None => PlayerStore::new(),
        };
        let store = Arc::new(store);
        let metrics = Arc::new(SessionMetrics::new());

        let handshake = Arc::new(HandshakeProcessor::new(
            store.clone(),
            Arc::new(mods),
            world.clone(),
            simulation,
            metrics.clone(),
        ));
        let builder = Dispatcher::builder(metrics.clone()).register::<HandshakeRequest>(handshake)?;
        let dispatcher = extend(builder)?.build();

        Ok(Self {
            config,
            store,
            world,
            dispatcher,
            metrics,
            save_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PlayerStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn on_connect(&self, conn: ConnectionHandle) -> Result<()> {
        self.store.accept(conn)?;
        self.metrics.connection_opened();
        Ok(())
    }

    /// Inbound `[tag][payload]` buffer
    pub fn on_packet(&self, conn: &ConnectionHandle, raw: &[u8]) -> Result<()> {
        self.dispatcher.dispatch(conn, raw)
    }

    pub fn on_frame(&self, conn: &ConnectionHandle, frame: &Frame) -> Result<()> {
        self.dispatcher.dispatch_frame(conn, frame)
    }

    pub fn on_sync_complete(&self, id: ConnectionId) -> Result<()> {
        let record = self.store.complete_sync(id)?;
        self.metrics.player_connected();
        info!(connection = %id, player_id = record.id(), "Player connected");
        Ok(())
    }

    /// Forget a closed connection. Admitted players have their data saved and
    /// the remaining peers are told they left. May write the persisted file,
    /// see [`SessionHost::save_persisted`].
    pub fn on_disconnect(&self, id: ConnectionId) -> Result<()> {
        let removed = self.store.remove_everywhere(id)?;
        self.metrics.connection_closed();

        let Some((state, record)) = removed else {
            debug!(connection = %id, "Disconnected connection held no record");
            return Ok(());
        };

        if state == PlayerState::Pending {
            debug!(connection = %id, "Pending connection closed");
            return Ok(());
        }
        if state == PlayerState::Connected {
            self.metrics.player_left();
        }

        self.store.save_player(&record)?;
        if self.config.persistence.save_on_disconnect {
            if let Err(e) = self.save_persisted() {
                warn!(error = %e, "Failed to save persisted players");
            }
        }

        self.world.on_player_left(record.id());

        let notice = PlayerLeft {
            player_id: record.id(),
            username: record.data.username.clone(),
        };
        let frame = Frame::from_packet(&notice)?;
        for (peer_id, peer) in self.store.connected().snapshot()? {
            if let Err(e) = peer.connection.send_frame(frame.clone()) {
                debug!(peer = %peer_id, error = %e, "Leave notice not delivered");
            }
        }

        info!(connection = %id, player_id = record.id(), ?state, "Player left");
        Ok(())
    }

    /// Write the persisted map to the configured file; no-op without one.
    ///
    /// Saves are serialized and each one snapshots the map after taking the
    /// save lock, so the file always ends up holding the newest snapshot.
    /// Blocks on file I/O; async callers should run it on a blocking thread.
    pub fn save_persisted(&self) -> Result<()> {
        let Some(path) = &self.config.persistence.path else {
            return Ok(());
        };
        let _guard = self
            .save_lock
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned(constants::LOCK_SAVE))?;
        persistence::save_to_file(path, &self.store.persisted_snapshot()?)
    }
}

//! # Session Protocol
//!
//! Host-side core of a multiplayer game session: a binary packet codec, a
//! tag-based packet dispatcher, a player store with independently locked
//! lifecycle collections, and the handshake that admits peers after checking
//! their mods and game version.
//!
//! ## Layers
//! - [`core`]: field codec, typed packets and frames, stream codec
//! - [`protocol`]: connections, wire packets, dispatcher, handshake processor
//! - [`session`]: player store, mod registry, persistence, [`SessionHost`]
//! - [`transport`]: in-memory and TCP connections
//! - [`utils`]: buffer pool, logging, metrics
//!
//! ## Example
//! ```rust,no_run
//! use session_protocol::{
//!     config::SessionConfig, GalaxyDescription, HostSimulation, ModRegistry, SessionHost,
//!     TechBonuses, WorldSession,
//! };
//! use std::sync::Arc;
//!
//! struct World;
//! impl WorldSession for World {
//!     fn on_player_joining(&self) {}
//! }
//!
//! struct Sim;
//! impl HostSimulation for Sim {
//!     fn game_version_sig(&self) -> u64 { 1 }
//!     fn galaxy(&self) -> GalaxyDescription { GalaxyDescription::default() }
//!     fn current_tech_bonuses(&self, _: u16) -> TechBonuses { TechBonuses::default() }
//! }
//!
//! # async fn run() -> session_protocol::Result<()> {
//! let config = SessionConfig::from_env()?;
//! session_protocol::utils::logging::init_logging(&config.logging)?;
//! let mods = ModRegistry::new(config.mods.version_policy);
//! let host = Arc::new(SessionHost::new(config, mods, Arc::new(World), Arc::new(Sim))?);
//!
//! let listener = session_protocol::transport::bind(&host.config().server).await?;
//! let (_stop, shutdown) = tokio::sync::mpsc::channel(1);
//! session_protocol::transport::serve(listener, host, shutdown).await
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;

pub use crate::core::packet::{Frame, Packet};
pub use error::{ProtocolError, Result};
pub use protocol::packets::GalaxyDescription;
pub use protocol::{Connection, ConnectionHandle, DisconnectReason, HandshakeOutcome};
pub use session::player::TechBonuses;
pub use session::{HostSimulation, ModRegistry, SessionHost, WorldSession};

//! # Session State
//!
//! Player records and their lifecycle store, the host's mod set, persisted
//! player data, and the host that drives them.

pub mod host;
pub mod mods;
pub mod persistence;
pub mod player;
pub mod store;

pub use host::{HostSimulation, SessionHost, WorldSession};
pub use mods::{ModDescriptor, ModEntry, ModRegistry};
pub use player::{PlayerData, PlayerRecord, PlayerState};
pub use store::PlayerStore;

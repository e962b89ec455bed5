//! Player records and the data exchanged about them.
//!
//! [`PlayerData`] is what gets persisted per client certificate and sent back to
//! the joining peer. [`PublicPlayerData`] is the subset other peers may see; it
//! leaves out the mecha payload (inventory and tech bonuses).

use crate::core::binary::{BinaryReader, BinaryWriter};
use crate::error::Result;
use crate::protocol::connection::{ConnectionHandle, ConnectionId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Lifecycle position of a record in the player store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    Pending,
    Syncing,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MechaColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for MechaColor {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 0.6846404,
            b: 0.24313718,
            a: 1.0,
        }
    }
}

impl MechaColor {
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer
            .write_f32(self.r)
            .write_f32(self.g)
            .write_f32(self.b)
            .write_f32(self.a);
    }

    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            r: reader.read_f32()?,
            g: reader.read_f32()?,
            b: reader.read_f32()?,
            a: reader.read_f32()?,
        })
    }
}

/// Host-side upgrades applied to a joining player's mecha
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TechBonuses {
    pub core_energy_cap: f64,
    pub core_level: i32,
    pub thruster_level: i32,
    pub walk_speed: f32,
    pub max_warp_speed: f64,
    pub build_area: f32,
    pub drone_count: i32,
    pub drone_speed: f32,
    pub inventory_size: i32,
}

/// Private per-player payload, never broadcast to other peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MechaData {
    /// Opaque serialized inventory, owned by the simulation layer
    pub inventory: Vec<u8>,
    pub sand_count: i64,
    pub tech_bonuses: TechBonuses,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerData {
    pub player_id: u16,
    pub username: String,
    pub mecha_color: MechaColor,
    pub local_planet_id: i32,
    pub position: [f64; 3],
    pub mecha: MechaData,
}

impl PlayerData {
    /// Fresh data for a peer that has not joined before
    pub fn new(player_id: u16) -> Self {
        Self {
            player_id,
            ..Self::default()
        }
    }

    /// Copy without the mecha payload
    pub fn public_copy(&self) -> PublicPlayerData {
        PublicPlayerData {
            player_id: self.player_id,
            username: self.username.clone(),
            mecha_color: self.mecha_color,
            local_planet_id: self.local_planet_id,
            position: self.position,
        }
    }

    pub fn to_blob(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(blob)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayerData {
    pub player_id: u16,
    pub username: String,
    pub mecha_color: MechaColor,
    pub local_planet_id: i32,
    pub position: [f64; 3],
}

/// Content hash of a client certificate, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CertHash(String);

impl CertHash {
    pub fn of(cert: &[u8]) -> Self {
        let digest = Sha256::digest(cert);
        let hex = digest.iter().fold(String::with_capacity(64), |mut acc, b| {
            acc.push_str(&format!("{b:02x}"));
            acc
        });
        CertHash(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short prefix is enough to tell players apart in logs
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

/// One human participant, from accept until disconnect
#[derive(Clone)]
pub struct PlayerRecord {
    pub connection: ConnectionHandle,
    pub data: PlayerData,
    /// Known once the handshake has hashed the client certificate
    pub cert_hash: Option<CertHash>,
}

impl PlayerRecord {
    /// A record for a freshly accepted connection; it has no player id yet
    pub fn pending(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            data: PlayerData::default(),
            cert_hash: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// 0 until an id is assigned by the handshake
    pub fn id(&self) -> u16 {
        self.data.player_id
    }

    /// Replace the data with a returning player's saved data, keeping this session's id
    pub fn load_user_data(&mut self, saved: PlayerData) {
        let id = self.data.player_id;
        self.data = saved;
        self.data.player_id = id;
    }

    /// Supplied username, or `Player {id}` when blank
    pub fn apply_username(&mut self, supplied: &str) {
        let trimmed = supplied.trim();
        self.data.username = if trimmed.is_empty() {
            format!("Player {}", self.data.player_id)
        } else {
            supplied.to_string()
        };
    }
}

impl fmt::Debug for PlayerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerRecord")
            .field("connection", &self.connection.id())
            .field("player_id", &self.data.player_id)
            .field("username", &self.data.username)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryConnection;

    #[test]
    fn test_public_copy_drops_mecha() {
        let mut data = PlayerData::new(4);
        data.username = "Ada".into();
        data.mecha.inventory = vec![1, 2, 3];
        let public = data.public_copy();
        assert_eq!(public.player_id, 4);
        assert_eq!(public.username, "Ada");
        let blob = bincode::serialize(&public).unwrap();
        assert!(blob.len() < data.to_blob().unwrap().len());
    }

    #[test]
    fn test_cert_hash_is_stable_hex() {
        let a = CertHash::of(b"cert-a");
        assert_eq!(a, CertHash::of(b"cert-a"));
        assert_ne!(a, CertHash::of(b"cert-b"));
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_username_defaulting() {
        let mut record = PlayerRecord::pending(MemoryConnection::new());
        record.data.player_id = 7;
        record.apply_username("   ");
        assert_eq!(record.data.username, "Player 7");
        record.apply_username("");
        assert_eq!(record.data.username, "Player 7");
        record.apply_username("Grace");
        assert_eq!(record.data.username, "Grace");
    }

    #[test]
    fn test_load_keeps_session_id() {
        let mut record = PlayerRecord::pending(MemoryConnection::new());
        record.data.player_id = 3;
        let mut saved = PlayerData::new(9);
        saved.mecha.sand_count = 500;
        record.load_user_data(saved);
        assert_eq!(record.id(), 3);
        assert_eq!(record.data.mecha.sand_count, 500);
    }

    #[test]
    fn test_blob_roundtrip_keeps_mecha() {
        let mut data = PlayerData::new(2);
        data.mecha.tech_bonuses.drone_count = 12;
        let restored = PlayerData::from_blob(&data.to_blob().unwrap()).unwrap();
        assert_eq!(restored, data);
    }
}

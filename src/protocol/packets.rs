//! Session wire packets.
//!
//! | tag | packet              | direction          |
//! |-----|---------------------|--------------------|
//! | 1   | `HandshakeRequest`  | peer → host        |
//! | 2   | `HandshakeResponse` | host → joining peer|
//! | 3   | `PlayerJoining`     | host → connected   |
//! | 4   | `PlayerLeft`        | host → connected   |
//! | 5   | `Disconnect`        | host → peer        |

use crate::core::binary::{BinaryReader, BinaryWriter};
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::disconnect::DisconnectReason;
use crate::session::mods::ModDescriptor;
use crate::session::player::{MechaColor, PlayerData, PublicPlayerData};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeRequest {
    pub mods: Vec<ModDescriptor>,
    pub game_version_sig: u64,
    pub client_cert: Vec<u8>,
    pub username: String,
    pub mecha_color: MechaColor,
}

impl Packet for HandshakeRequest {
    const TAG: u16 = 1;
    const NAME: &'static str = "HandshakeRequest";

    fn encode(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.mods.len() as u32);
        for m in &self.mods {
            writer.write_string(&m.identifier).write_string(&m.version);
        }
        writer
            .write_u64(self.game_version_sig)
            .write_bytes(&self.client_cert)
            .write_string(&self.username);
        self.mecha_color.write(writer);
        Ok(())
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        // every pair takes at least two length bytes
        if count > reader.remaining() / 2 {
            return Err(ProtocolError::MalformedPacket(format!(
                "mod count {count} exceeds payload"
            )));
        }

        let mut mods = Vec::with_capacity(count);
        let mut seen = HashSet::with_capacity(count);
        for _ in 0..count {
            let identifier = reader.read_string()?;
            let version = reader.read_string()?;
            if !seen.insert(identifier.clone()) {
                return Err(ProtocolError::MalformedPacket(format!(
                    "mod {identifier} declared twice"
                )));
            }
            mods.push(ModDescriptor { identifier, version });
        }

        Ok(Self {
            mods,
            game_version_sig: reader.read_u64()?,
            client_cert: reader.read_bytes()?,
            username: reader.read_string()?,
            mecha_color: MechaColor::read(reader)?,
        })
    }
}

/// World-generation parameters a joining peer needs to rebuild the galaxy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GalaxyDescription {
    pub algo: i32,
    pub seed: i32,
    pub star_count: i32,
    pub resource_multiplier: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResponse {
    pub galaxy: GalaxyDescription,
    pub is_new_user: bool,
    pub player: PlayerData,
    pub mod_settings: Vec<u8>,
    pub mod_settings_count: u32,
}

impl Packet for HandshakeResponse {
    const TAG: u16 = 2;
    const NAME: &'static str = "HandshakeResponse";

    fn encode(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer
            .write_i32(self.galaxy.algo)
            .write_i32(self.galaxy.seed)
            .write_i32(self.galaxy.star_count)
            .write_f32(self.galaxy.resource_multiplier)
            .write_bool(self.is_new_user)
            .write_bytes(&self.player.to_blob()?)
            .write_bytes(&self.mod_settings)
            .write_u32(self.mod_settings_count);
        Ok(())
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let galaxy = GalaxyDescription {
            algo: reader.read_i32()?,
            seed: reader.read_i32()?,
            star_count: reader.read_i32()?,
            resource_multiplier: reader.read_f32()?,
        };
        let is_new_user = reader.read_bool()?;
        let player = PlayerData::from_blob(reader.read_bytes_ref()?)
            .map_err(|e| ProtocolError::MalformedPacket(e.to_string()))?;
        Ok(Self {
            galaxy,
            is_new_user,
            player,
            mod_settings: reader.read_bytes()?,
            mod_settings_count: reader.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerJoining {
    pub player: PublicPlayerData,
}

impl Packet for PlayerJoining {
    const TAG: u16 = 3;
    const NAME: &'static str = "PlayerJoining";

    fn encode(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_bytes(&bincode::serialize(&self.player)?);
        Ok(())
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let player = bincode::deserialize(reader.read_bytes_ref()?)
            .map_err(|e| ProtocolError::MalformedPacket(e.to_string()))?;
        Ok(Self { player })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLeft {
    pub player_id: u16,
    pub username: String,
}

impl Packet for PlayerLeft {
    const TAG: u16 = 4;
    const NAME: &'static str = "PlayerLeft";

    fn encode(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u16(self.player_id).write_string(&self.username);
        Ok(())
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            player_id: reader.read_u16()?,
            username: reader.read_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: DisconnectReason,
}

impl Packet for Disconnect {
    const TAG: u16 = 5;
    const NAME: &'static str = "Disconnect";

    fn encode(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer
            .write_u16(self.reason.code())
            .write_string(&self.reason.payload());
        Ok(())
    }

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let code = reader.read_u16()?;
        let payload = reader.read_string()?;
        Ok(Self {
            reason: DisconnectReason::from_wire(code, payload),
        })
    }
}

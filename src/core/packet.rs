//! Typed packets and the tagged frame that carries them.
//!
//! ```text
//! [Tag(2, LE)] [Payload(N)]
//! ```

use crate::core::binary::{BinaryReader, BinaryWriter};
use crate::error::{constants, ProtocolError, Result};
use crate::utils::buffer_pool::BufferPool;

/// Size of the type tag at the front of every frame
pub const TAG_LEN: usize = 2;

/// A wire packet with a fixed type tag.
///
/// `decode` receives a reader positioned right after the tag.
pub trait Packet: Sized + Send + 'static {
    const TAG: u16;
    const NAME: &'static str;

    fn encode(&self, writer: &mut BinaryWriter) -> Result<()>;

    fn decode(reader: &mut BinaryReader<'_>) -> Result<Self>;
}

/// A tagged payload as it travels between host and peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(tag: u16, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    /// Encode a typed packet into a frame
    pub fn from_packet<P: Packet>(packet: &P) -> Result<Self> {
        let mut writer = BinaryWriter::new();
        packet.encode(&mut writer)?;
        Ok(Self::new(P::TAG, writer.finish()))
    }

    /// Same as [`Frame::from_packet`], with the scratch buffer taken from `pool`
    pub fn from_packet_pooled<P: Packet>(packet: &P, pool: &BufferPool) -> Result<Self> {
        let mut writer = BinaryWriter::pooled(pool);
        packet.encode(&mut writer)?;
        Ok(Self::new(P::TAG, writer.finish()))
    }

    /// Decode the payload as `P`. Fails if the tag does not belong to `P`.
    pub fn decode<P: Packet>(&self) -> Result<P> {
        if self.tag != P::TAG {
            return Err(ProtocolError::MalformedPacket(format!(
                "expected {} (tag {}), got tag {}",
                P::NAME,
                P::TAG,
                self.tag
            )));
        }
        P::decode(&mut BinaryReader::new(&self.payload))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TAG_LEN + self.payload.len());
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < TAG_LEN {
            return Err(ProtocolError::malformed(constants::ERR_MISSING_TAG));
        }
        let tag = u16::from_le_bytes([buf[0], buf[1]]);
        Ok(Self::new(tag, buf[TAG_LEN..].to_vec()))
    }
}

/// Split a raw buffer into its tag and payload without copying
pub fn split_tag(buf: &[u8]) -> Result<(u16, &[u8])> {
    if buf.len() < TAG_LEN {
        return Err(ProtocolError::malformed(constants::ERR_MISSING_TAG));
    }
    Ok((u16::from_le_bytes([buf[0], buf[1]]), &buf[TAG_LEN..]))
}

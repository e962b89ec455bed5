//! Stream framing for byte-oriented transports.
//!
//! ```text
//! [Length(4, LE)] [Tag(2, LE)] [Payload(Length - 2)]
//! ```
//!
//! The length is checked against the configured maximum before any payload
//! memory is reserved.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_FRAME_SIZE;
use crate::core::packet::{Frame, TAG_LEN};
use crate::error::{constants, ProtocolError, Result};

const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedPacket(len));
        }
        if len < TAG_LEN {
            return Err(ProtocolError::malformed(constants::ERR_MISSING_TAG));
        }

        if src.len() < LENGTH_PREFIX + len {
            src.reserve(LENGTH_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let tag = src.get_u16_le();
        let payload = src.split_to(len - TAG_LEN).to_vec();
        Ok(Some(Frame::new(tag, payload)))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let len = TAG_LEN + frame.payload.len();
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedPacket(len));
        }
        dst.reserve(LENGTH_PREFIX + len);
        dst.put_u32_le(len as u32);
        dst.put_u16_le(frame.tag);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

//! # Binary Codec
//!
//! Typed field encoding for packet payloads.
//!
//! ## Layout
//! - Integers and floats are little-endian
//! - `bool` is a single byte, `0` or `1`
//! - Strings and byte spans carry a 7-bit varint length prefix (at most 5 bytes)
//!
//! A [`BinaryWriter`] is a scoped resource: [`BinaryWriter::finish`] consumes it and
//! yields the accumulated bytes once. A writer backed by a [`BufferPool`] hands its
//! buffer back to the pool when dropped, whether it finished or bailed out early.
//!
//! A [`BinaryReader`] walks a borrowed slice. Every read checks the remaining length
//! first and fails with `MalformedPacket` instead of panicking.

use crate::error::{constants, ProtocolError, Result};
use crate::utils::buffer_pool::{BufferPool, PooledBuffer};
use bytes::{Buf, BufMut};

/// Longest accepted varint encoding of a `u32`
const MAX_VARINT_LEN: usize = 5;

enum WriterBuffer {
    Owned(Vec<u8>),
    Pooled(PooledBuffer),
}

/// Append-only writer for typed packet fields
pub struct BinaryWriter {
    buffer: WriterBuffer,
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryWriter {
    /// Writer over a freshly allocated buffer
    pub fn new() -> Self {
        Self {
            buffer: WriterBuffer::Owned(Vec::new()),
        }
    }

    /// Writer over a buffer borrowed from `pool`
    pub fn pooled(pool: &BufferPool) -> Self {
        Self {
            buffer: WriterBuffer::Pooled(pool.acquire()),
        }
    }

    fn buf(&mut self) -> &mut Vec<u8> {
        match &mut self.buffer {
            WriterBuffer::Owned(v) => v,
            WriterBuffer::Pooled(p) => p.as_mut(),
        }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        match &self.buffer {
            WriterBuffer::Owned(v) => v.len(),
            WriterBuffer::Pooled(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf().put_u8(value);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf().put_u16_le(value);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf().put_u32_le(value);
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf().put_i32_le(value);
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.buf().put_u64_le(value);
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buf().put_f32_le(value);
        self
    }

    /// 7 bits per byte, high bit set while more bytes follow
    pub fn write_varint(&mut self, mut value: u32) -> &mut Self {
        let buf = self.buf();
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                buf.put_u8(byte);
                break;
            }
            buf.put_u8(byte | 0x80);
        }
        self
    }

    /// Length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_bytes(value.as_bytes())
    }

    /// Length-prefixed byte span
    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.write_varint(value.len() as u32);
        self.buf().put_slice(value);
        self
    }

    /// Bytes without a length prefix, for fixed-size fields
    pub fn write_raw(&mut self, value: &[u8]) -> &mut Self {
        self.buf().put_slice(value);
        self
    }

    /// Yield the accumulated bytes. A pooled buffer goes back to its pool.
    pub fn finish(mut self) -> Vec<u8> {
        match &mut self.buffer {
            WriterBuffer::Owned(v) => std::mem::take(v),
            WriterBuffer::Pooled(p) => p.to_vec(),
        }
    }
}

/// Cursor over a fixed buffer
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtocolError::MalformedPacket(format!(
                "{}: need {len} bytes at offset {}, {} left",
                constants::ERR_UNEXPECTED_EOF,
                self.position,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ProtocolError::malformed(constants::ERR_INVALID_BOOL)),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.take(2)?.get_u16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.get_u32_le())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.take(4)?.get_i32_le())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.take(8)?.get_u64_le())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.take(4)?.get_f32_le())
    }

    pub fn read_varint(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::malformed(constants::ERR_VARINT_TOO_LONG))
    }

    /// Length-prefixed span, borrowed from the underlying buffer
    pub fn read_bytes_ref(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.read_bytes_ref().map(<[u8]>::to_vec)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let raw = self.read_bytes_ref()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::malformed(constants::ERR_INVALID_UTF8))
    }

    /// Fixed-size field without a length prefix
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

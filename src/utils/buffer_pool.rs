//! # Buffer Pool
//!
//! Reusable byte buffers for packet writers. Every outbound packet is built in a
//! scratch buffer, so handshake bursts would otherwise allocate one per peer.
//!
//! ## Usage
//! ```rust
//! use session_protocol::core::binary::BinaryWriter;
//! use session_protocol::utils::buffer_pool::BufferPool;
//!
//! let pool = BufferPool::new(8);
//! let mut writer = BinaryWriter::pooled(&pool);
//! writer.write_string("hello");
//! let bytes = writer.finish(); // scratch buffer goes back to the pool here
//! assert_eq!(pool.available(), 8);
//! # assert_eq!(bytes.len(), 6);
//! ```

use std::sync::{Arc, Mutex};

/// Buffers that grew beyond this are dropped instead of pooled
const MAX_POOLED_BUFFER_SIZE: usize = 64 * 1024;

/// Capacity of freshly allocated buffers
const DEFAULT_BUFFER_CAPACITY: usize = 1024;

type Shelf = Arc<Mutex<Vec<Vec<u8>>>>;

/// A buffer on loan from a [`BufferPool`]; returned when dropped
pub struct PooledBuffer {
    buffer: Vec<u8>,
    shelf: Shelf,
}

impl PooledBuffer {
    #[allow(clippy::should_implement_trait)]
    pub fn as_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if self.buffer.capacity() > MAX_POOLED_BUFFER_SIZE {
            return;
        }
        self.buffer.clear();
        if let Ok(mut shelf) = self.shelf.lock() {
            shelf.push(std::mem::take(&mut self.buffer));
        }
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

/// Thread-safe pool of scratch buffers. Clones share the same shelf.
#[derive(Clone)]
pub struct BufferPool {
    shelf: Shelf,
}

impl BufferPool {
    /// Create a pool pre-filled with `size` buffers
    pub fn new(size: usize) -> Self {
        let buffers = (0..size)
            .map(|_| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY))
            .collect();
        Self {
            shelf: Arc::new(Mutex::new(buffers)),
        }
    }

    /// Take a buffer, allocating when the shelf is empty
    pub fn acquire(&self) -> PooledBuffer {
        let buffer = self
            .shelf
            .lock()
            .ok()
            .and_then(|mut shelf| shelf.pop())
            .unwrap_or_else(|| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY));

        PooledBuffer {
            buffer,
            shelf: self.shelf.clone(),
        }
    }

    /// Buffers currently on the shelf
    pub fn available(&self) -> usize {
        self.shelf.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(32)
    }
}

//! # Transports
//!
//! Concrete [`Connection`](crate::protocol::connection::Connection)s.
//!
//! - **memory**: in-process, records outbound frames
//! - **tcp**: tokio listener with length-prefixed framing and bounded outbound queues

pub mod memory;
pub mod tcp;

pub use memory::MemoryConnection;
pub use tcp::{bind, serve, TcpConnection};

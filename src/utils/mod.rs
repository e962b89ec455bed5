//! # Utility Modules
//!
//! - **Buffer Pool**: reusable scratch buffers for frame encoding
//! - **Logging**: tracing subscriber setup
//! - **Metrics**: session counters shared by the dispatcher, handshake, and host

pub mod buffer_pool;
pub mod logging;
pub mod metrics;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use metrics::{MetricsSnapshot, SessionMetrics};

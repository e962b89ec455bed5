//! Session Metrics
//!
//! Atomic counters for connection, dispatch, and handshake activity. One
//! instance is shared via `Arc` by the dispatcher, handshake processor, and host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug)]
pub struct SessionMetrics {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    /// Frames handed to a processor
    pub packets_dispatched: AtomicU64,
    /// Frames dropped for an unregistered tag
    pub packets_unknown: AtomicU64,
    /// Frames whose payload failed to decode
    pub packets_malformed: AtomicU64,
    pub handshakes_total: AtomicU64,
    pub handshakes_admitted: AtomicU64,
    pub handshakes_rejected: AtomicU64,
    /// Players that finished syncing and are currently in the session
    pub players_connected: AtomicU64,
    start_time: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            packets_dispatched: AtomicU64::new(0),
            packets_unknown: AtomicU64::new(0),
            packets_malformed: AtomicU64::new(0),
            handshakes_total: AtomicU64::new(0),
            handshakes_admitted: AtomicU64::new(0),
            handshakes_rejected: AtomicU64::new(0),
            players_connected: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // saturating: a close racing a reset must not wrap
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn packet_dispatched(&self) {
        self.packets_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_unknown(&self) {
        self.packets_unknown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_malformed(&self) {
        self.packets_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_admitted(&self) {
        self.handshakes_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn player_connected(&self) {
        self.players_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn player_left(&self) {
        let _ = self
            .players_connected
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            packets_dispatched: self.packets_dispatched.load(Ordering::Relaxed),
            packets_unknown: self.packets_unknown.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            handshakes_admitted: self.handshakes_admitted.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            players_connected: self.players_connected.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            connections_total = s.connections_total,
            connections_active = s.connections_active,
            packets_dispatched = s.packets_dispatched,
            packets_unknown = s.packets_unknown,
            packets_malformed = s.packets_malformed,
            handshakes_total = s.handshakes_total,
            handshakes_admitted = s.handshakes_admitted,
            handshakes_rejected = s.handshakes_rejected,
            players_connected = s.players_connected,
            uptime_seconds = s.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub packets_dispatched: u64,
    pub packets_unknown: u64,
    pub packets_malformed: u64,
    pub handshakes_total: u64,
    pub handshakes_admitted: u64,
    pub handshakes_rejected: u64,
    pub players_connected: u64,
    pub uptime_seconds: u64,
}

/// Logs how long a scope took when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            duration_us = self.elapsed().as_micros() as u64,
            "Operation completed"
        );
    }
}

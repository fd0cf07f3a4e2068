// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Distribution server metrics.
//!
//! # Example
//!
//! ```
//! use tracer::distribution::ServerStats;
//!
//! let stats = ServerStats::new();
//! stats.record_hit(1024);
//! stats.record_miss();
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.requests, 2);
//! assert_eq!(snapshot.bytes_sent, 1024);
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters updated by the server thread, readable from anywhere.
#[derive(Debug)]
pub struct ServerStats {
    /// Requests answered (hits + misses)
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Response payload bytes written (excluding framing)
    bytes_sent: AtomicU64,
    peers_accepted: AtomicU64,
    /// Peers dropped on protocol or I/O errors
    peers_dropped: AtomicU64,
    peers_refused: AtomicU64,
    active_peers: AtomicUsize,
    start_time: Instant,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            peers_accepted: AtomicU64::new(0),
            peers_dropped: AtomicU64::new(0),
            peers_refused: AtomicU64::new(0),
            active_peers: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    // ========================================================================
    // Request recording
    // ========================================================================

    /// Record a request answered from the cache.
    pub fn record_hit(&self, bytes: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a request answered with an empty response.
    pub fn record_miss(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // ========================================================================
    // Peer recording
    // ========================================================================

    pub fn record_peer_accepted(&self) {
        self.peers_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_peers.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a peer removed after an error.
    pub fn record_peer_dropped(&self) {
        self.peers_dropped.fetch_add(1, Ordering::Relaxed);
        self.record_peer_closed();
    }

    /// Record a peer that disconnected (or was closed at shutdown).
    pub fn record_peer_closed(&self) {
        let _ = self
            .active_peers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record a connection refused because the peer limit was reached.
    pub fn record_peer_refused(&self) {
        self.peers_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            peers_accepted: self.peers_accepted.load(Ordering::Relaxed),
            peers_dropped: self.peers_dropped.load(Ordering::Relaxed),
            peers_refused: self.peers_refused.load(Ordering::Relaxed),
            active_peers: self.active_peers.load(Ordering::Relaxed),
            uptime: self.uptime(),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub bytes_sent: u64,
    pub peers_accepted: u64,
    pub peers_dropped: u64,
    pub peers_refused: u64,
    pub active_peers: usize,
    pub uptime: Duration,
}

impl ServerStatsSnapshot {
    /// Fraction of requests answered from the cache (0.0 when idle).
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }
}

impl std::fmt::Display for ServerStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} hits={} misses={} bytes_sent={} peers={}/{} dropped={} refused={} uptime={:.1}s",
            self.requests,
            self.hits,
            self.misses,
            self.bytes_sent,
            self.active_peers,
            self.peers_accepted,
            self.peers_dropped,
            self.peers_refused,
            self.uptime.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_accounting() {
        let stats = ServerStats::new();
        stats.record_peer_accepted();
        stats.record_peer_accepted();
        stats.record_peer_dropped();
        stats.record_peer_closed();
        stats.record_peer_closed(); // never underflows

        let snap = stats.snapshot();
        assert_eq!(snap.peers_accepted, 2);
        assert_eq!(snap.peers_dropped, 1);
        assert_eq!(snap.active_peers, 0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = ServerStats::new();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);
        stats.record_hit(3);
        stats.record_miss();
        assert!((stats.snapshot().hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway statistics
//!
//! Every drop and every recovered error ends up in one of these counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Gateway statistics
#[derive(Debug)]
pub struct GatewayStats {
    /// Frames received from the radio
    pub frames_received: AtomicU64,
    /// Payload bytes received from the radio
    pub bytes_received: AtomicU64,
    /// Frames dropped by the address filter
    pub frames_rejected: AtomicU64,
    /// Frames dropped as retransmitted duplicates
    pub frames_duplicate: AtomicU64,
    /// Acks sent back over the radio
    pub acks_sent: AtomicU64,
    /// Acks received for outbound frames
    pub acks_received: AtomicU64,
    /// Outbound exchanges that ran out of retries
    pub ack_timeouts: AtomicU64,
    /// Frames transmitted (including retries and acks)
    pub radio_tx: AtomicU64,
    /// Receive/transmit failures on the radio
    pub link_errors: AtomicU64,
    /// Frames dropped because the publish queue stayed full
    pub queue_drops: AtomicU64,
    /// Messages confirmed by the bus
    pub messages_published: AtomicU64,
    /// Payload bytes published
    pub bytes_published: AtomicU64,
    /// Messages dropped after a publish or connect failure
    pub publish_failures: AtomicU64,
    /// Connect attempts made against the broker
    pub connect_attempts: AtomicU64,
    /// Connections established
    pub connections: AtomicU64,
    /// Start time
    start_time: Instant,
}

impl GatewayStats {
    /// Create new statistics tracker
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            frames_duplicate: AtomicU64::new(0),
            acks_sent: AtomicU64::new(0),
            acks_received: AtomicU64::new(0),
            ack_timeouts: AtomicU64::new(0),
            radio_tx: AtomicU64::new(0),
            link_errors: AtomicU64::new(0),
            queue_drops: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            connect_attempts: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a received frame
    pub fn record_rx(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record an address-filter drop
    pub fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a duplicate drop
    pub fn record_duplicate(&self) {
        self.frames_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ack sent
    pub fn record_ack_sent(&self) {
        self.acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ack received
    pub fn record_ack_received(&self) {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an exhausted retry budget
    pub fn record_ack_timeout(&self) {
        self.ack_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a radio transmission
    pub fn record_tx(&self) {
        self.radio_tx.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a radio failure
    pub fn record_link_error(&self) {
        self.link_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a queue overflow drop
    pub fn record_queue_drop(&self) {
        self.queue_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a confirmed publish
    pub fn record_published(&self, bytes: usize) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a dropped message after a bus failure
    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connect attempt
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an established connection
    pub fn record_connected(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get snapshot of all stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            frames_duplicate: self.frames_duplicate.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            acks_received: self.acks_received.load(Ordering::Relaxed),
            ack_timeouts: self.ack_timeouts.load(Ordering::Relaxed),
            radio_tx: self.radio_tx.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Format stats as string
    pub fn format_summary(&self) -> String {
        let snap = self.snapshot();
        format!(
            "Gateway Stats (uptime: {}s)\n\
             Radio: RX {} frames ({} bytes), TX {} frames, acks sent={} received={} timeouts={}\n\
             Bus:   published {} msgs ({} bytes), failures={}, connects={}/{}\n\
             Drops: rejected={}, duplicate={}, queue={}, link_errors={}",
            snap.uptime_secs,
            snap.frames_received,
            snap.bytes_received,
            snap.radio_tx,
            snap.acks_sent,
            snap.acks_received,
            snap.ack_timeouts,
            snap.messages_published,
            snap.bytes_published,
            snap.publish_failures,
            snap.connections,
            snap.connect_attempts,
            snap.frames_rejected,
            snap.frames_duplicate,
            snap.queue_drops,
            snap.link_errors
        )
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics snapshot (immutable copy of current stats)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub frames_rejected: u64,
    pub frames_duplicate: u64,
    pub acks_sent: u64,
    pub acks_received: u64,
    pub ack_timeouts: u64,
    pub radio_tx: u64,
    pub link_errors: u64,
    pub queue_drops: u64,
    pub messages_published: u64,
    pub bytes_published: u64,
    pub publish_failures: u64,
    pub connect_attempts: u64,
    pub connections: u64,
    pub uptime_secs: u64,
}

//! Observability and Metrics
//!
//! This module provides metrics collection for monitoring relay traffic
//! and connection health.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::core::message::Command;

/// Metrics collector for relay operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Connections refused because of the connection limit
    pub connections_rejected: AtomicU64,
    /// HELLO frames answered with ACK
    pub registrations_accepted: AtomicU64,
    /// HELLO frames answered with NACK
    pub registrations_rejected: AtomicU64,
    /// Frames decoded from clients
    pub messages_received: AtomicU64,
    /// SEND frames queued to a destination
    pub messages_relayed: AtomicU64,
    /// ACK replies queued
    pub acks_sent: AtomicU64,
    /// NACK replies queued
    pub nacks_sent: AtomicU64,
    /// Total bytes written to sockets
    pub bytes_sent: AtomicU64,
    /// Total bytes read from sockets
    pub bytes_received: AtomicU64,
    /// Connection errors (I/O faults, slow readers, accept failures)
    pub connection_errors: AtomicU64,
    /// Protocol errors (malformed or oversized frames)
    pub protocol_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            registrations_accepted: AtomicU64::new(0),
            registrations_rejected: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_relayed: AtomicU64::new(0),
            acks_sent: AtomicU64::new(0),
            nacks_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn registration_accepted(&self) {
        self.registrations_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn registration_rejected(&self) {
        self.registrations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame decoded from a client
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame queued for delivery
    pub fn message_queued(&self, command: Command) {
        let counter = match command {
            Command::Send => &self.messages_relayed,
            Command::Ack => &self.acks_sent,
            Command::Nack => &self.nacks_sent,
            Command::Hello | Command::Unknown(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self, byte_count: u64) {
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn bytes_received(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a connection error
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a protocol error
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            registrations_accepted: self.registrations_accepted.load(Ordering::Relaxed),
            registrations_rejected: self.registrations_rejected.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            nacks_sent: self.nacks_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            connections_rejected = snapshot.connections_rejected,
            registrations_accepted = snapshot.registrations_accepted,
            registrations_rejected = snapshot.registrations_rejected,
            messages_received = snapshot.messages_received,
            messages_relayed = snapshot.messages_relayed,
            acks_sent = snapshot.acks_sent,
            nacks_sent = snapshot.nacks_sent,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            connection_errors = snapshot.connection_errors,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Relay metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub registrations_accepted: u64,
    pub registrations_rejected: u64,
    pub messages_received: u64,
    pub messages_relayed: u64,
    pub acks_sent: u64,
    pub nacks_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub connection_errors: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_counters() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.connection_established();
        metrics.connection_closed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 2);
        assert_eq!(snapshot.connections_active, 1);
    }

    #[test]
    fn test_queued_frames_by_command() {
        let metrics = Metrics::new();
        metrics.message_queued(Command::Send);
        metrics.message_queued(Command::Ack);
        metrics.message_queued(Command::Ack);
        metrics.message_queued(Command::Nack);
        metrics.message_queued(Command::Unknown(9));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_relayed, 1);
        assert_eq!(snapshot.acks_sent, 2);
        assert_eq!(snapshot.nacks_sent, 1);
    }
}

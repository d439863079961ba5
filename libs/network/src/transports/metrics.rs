//! Transport Counters
//!
//! Lock-free counters updated from the accept workers and connection handlers.

use crate::TransportError;
use flow_codec::ProtocolError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Server-wide transport counters
#[derive(Debug, Default)]
pub struct ServerStats {
    connections_accepted: AtomicU64,
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    protocol_errors: AtomicU64,
    checksum_failures: AtomicU64,
    timeouts: AtomicU64,
    unknown_types: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerStatsSnapshot {
    pub connections_accepted: u64,
    pub frames_received: u64,
    pub frames_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub protocol_errors: u64,
    pub checksum_failures: u64,
    pub timeouts: u64,
    pub unknown_types: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_accept(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_receive(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_send(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unknown_type(&self) {
        self.unknown_types.fetch_add(1, Ordering::Relaxed);
    }

    /// Classify a connection-terminating error
    pub fn record_error(&self, error: &TransportError) {
        match error {
            TransportError::Protocol(ProtocolError::ChecksumMismatch { .. }) => {
                self.protocol_errors.fetch_add(1, Ordering::Relaxed);
                self.checksum_failures.fetch_add(1, Ordering::Relaxed);
            }
            TransportError::Protocol(_) => {
                self.protocol_errors.fetch_add(1, Ordering::Relaxed);
            }
            TransportError::Timeout { .. } => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            unknown_types: self.unknown_types.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let stats = ServerStats::new();
        stats.record_error(&ProtocolError::checksum_mismatch(1, 2, 3).into());
        stats.record_error(&ProtocolError::UnknownMessageType(9).into());
        stats.record_error(&TransportError::timeout("read_frame", 10));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.protocol_errors, 2);
        assert_eq!(snapshot.checksum_failures, 1);
        assert_eq!(snapshot.timeouts, 1);
    }

    #[test]
    fn test_traffic_counters() {
        let stats = ServerStats::new();
        stats.record_accept();
        stats.record_receive(40);
        stats.record_send(48);
        stats.record_send(40);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 1);
        assert_eq!(snapshot.frames_received, 1);
        assert_eq!(snapshot.bytes_sent, 88);
        assert_eq!(snapshot.frames_sent, 2);
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime byte and packet counters for one connection.
///
/// Updated from the I/O task and the sending caller concurrently, so every
/// field is atomic. A "packet" is one payload: one frame on TCP, one
/// datagram on the reliable channel.
#[derive(Debug, Default)]
pub struct TransportStats {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
}

/// A point-in-time copy of [`TransportStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outgoing payload of `byte_count` wire bytes.
    pub fn record_sent(&self, byte_count: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    /// Record raw bytes read from the wire, before framing.
    pub fn record_bytes_received(&self, byte_count: usize) {
        self.bytes_received
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    /// Record one complete incoming payload.
    pub fn record_packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = TransportStats::new();
        stats.record_sent(100);
        stats.record_sent(20);
        stats.record_bytes_received(7);
        stats.record_bytes_received(3);
        stats.record_packet_received();

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_sent, 120);
        assert_eq!(snap.packets_sent, 2);
        assert_eq!(snap.bytes_received, 10);
        assert_eq!(snap.packets_received, 1);
    }

    #[test]
    fn test_fresh_stats_are_zero() {
        assert_eq!(TransportStats::new().snapshot(), StatsSnapshot::default());
    }
}

//! Rolling rate counters.
//!
//! A [`RateCounter`] keeps ten 100 ms buckets, so its rate is the sum over
//! roughly the last second. Counters are owned by the dispatcher and
//! updated under its queue lock; the `*_at` variants take the current
//! instant explicitly so tests can drive time.

use std::time::{Duration, Instant};

const BUCKETS: usize = 10;
const BUCKET_WIDTH: Duration = Duration::from_millis(100);

/// Amount recorded over the last second plus a lifetime total.
#[derive(Debug, Clone)]
pub struct RateCounter {
    origin: Instant,
    buckets: [u64; BUCKETS],
    /// Absolute index of the newest bucket since `origin`.
    head: u64,
    total: u64,
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new_at(Instant::now())
    }
}

impl RateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_at(origin: Instant) -> Self {
        Self {
            origin,
            buckets: [0; BUCKETS],
            head: 0,
            total: 0,
        }
    }

    pub fn record(&mut self, amount: u64) {
        self.record_at(amount, Instant::now());
    }

    pub fn record_at(&mut self, amount: u64, now: Instant) {
        self.advance(now);
        let slot = (self.head % BUCKETS as u64) as usize;
        self.buckets[slot] = self.buckets[slot].saturating_add(amount);
        self.total = self.total.saturating_add(amount);
    }

    /// Amount recorded during the last second.
    pub fn per_second(&mut self) -> u64 {
        self.per_second_at(Instant::now())
    }

    pub fn per_second_at(&mut self, now: Instant) -> u64 {
        self.advance(now);
        self.buckets.iter().sum()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn advance(&mut self, now: Instant) {
        let index = (now.saturating_duration_since(self.origin).as_millis()
            / BUCKET_WIDTH.as_millis()) as u64;
        if index <= self.head {
            return;
        }
        let gap = index - self.head;
        if gap >= BUCKETS as u64 {
            self.buckets = [0; BUCKETS];
        } else {
            for i in self.head + 1..=index {
                self.buckets[(i % BUCKETS as u64) as usize] = 0;
            }
        }
        self.head = index;
    }
}

/// Point-in-time view of a dispatcher's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub messages_per_sec: u64,
    pub bytes_received_per_sec: u64,
    pub bytes_sent_per_sec: u64,
    pub messages_total: u64,
    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,
}

/// The three counters a dispatcher keeps.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) messages: RateCounter,
    pub(crate) bytes_received: RateCounter,
    pub(crate) bytes_sent: RateCounter,
}

impl Counters {
    pub(crate) fn snapshot(&mut self) -> DispatchStats {
        let now = Instant::now();
        DispatchStats {
            messages_per_sec: self.messages.per_second_at(now),
            bytes_received_per_sec: self.bytes_received.per_second_at(now),
            bytes_sent_per_sec: self.bytes_sent.per_second_at(now),
            messages_total: self.messages.total(),
            bytes_received_total: self.bytes_received.total(),
            bytes_sent_total: self.bytes_sent.total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_within_window() {
        let t0 = Instant::now();
        let mut counter = RateCounter::new_at(t0);
        counter.record_at(10, t0);
        counter.record_at(5, t0 + Duration::from_millis(350));
        counter.record_at(1, t0 + Duration::from_millis(900));
        assert_eq!(counter.per_second_at(t0 + Duration::from_millis(950)), 16);
        assert_eq!(counter.total(), 16);
    }

    #[test]
    fn test_old_buckets_expire() {
        let t0 = Instant::now();
        let mut counter = RateCounter::new_at(t0);
        counter.record_at(10, t0);
        counter.record_at(5, t0 + Duration::from_millis(500));
        // The first bucket has rolled out, the second has not.
        assert_eq!(counter.per_second_at(t0 + Duration::from_millis(1050)), 5);
        assert_eq!(counter.per_second_at(t0 + Duration::from_secs(5)), 0);
        assert_eq!(counter.total(), 15);
    }

    #[test]
    fn test_long_gap_clears_everything() {
        let t0 = Instant::now();
        let mut counter = RateCounter::new_at(t0);
        for i in 0..10 {
            counter.record_at(1, t0 + BUCKET_WIDTH * i);
        }
        assert_eq!(counter.per_second_at(t0 + Duration::from_millis(999)), 10);
        counter.record_at(3, t0 + Duration::from_secs(60));
        assert_eq!(counter.per_second_at(t0 + Duration::from_secs(60)), 3);
    }

    #[test]
    fn test_snapshot_reports_totals() {
        let mut counters = Counters::default();
        counters.messages.record(2);
        counters.bytes_received.record(100);
        counters.bytes_sent.record(40);
        let stats = counters.snapshot();
        assert_eq!(stats.messages_total, 2);
        assert_eq!(stats.bytes_received_total, 100);
        assert_eq!(stats.bytes_sent_total, 40);
        assert_eq!(stats.bytes_sent_per_sec, 40);
    }
}

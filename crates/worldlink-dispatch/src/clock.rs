//! Server/client clock reconciliation.
//!
//! The server stamps messages in its own clock. The client keeps one signed
//! offset and maps server stamps into local time with it. A mapped stamp
//! that would lie in the local future, or more than
//! [`MAX_DRIFT_MS`] away from now, resets the offset so that the stamp maps
//! to exactly now. Offsets therefore only ever move towards the smallest
//! observed latency.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Largest tolerated distance between a mapped stamp and the local clock.
pub const MAX_DRIFT_MS: i64 = 30_000;

#[derive(Debug, Default)]
pub struct ClockSync {
    offset: AtomicI64,
}

impl ClockSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset in milliseconds (client minus server).
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::Acquire)
    }

    /// Maps a server stamp into client time, correcting the offset when the
    /// mapping is implausible.
    pub fn adjust_timestamp(&self, server_ts: i64, client_now: i64) -> i64 {
        let offset = self.offset();
        let candidate = offset.wrapping_add(server_ts);
        let drift = candidate.wrapping_sub(client_now).unsigned_abs();
        if drift > MAX_DRIFT_MS as u64 || candidate > client_now {
            let corrected = client_now.wrapping_sub(server_ts);
            self.offset.store(corrected, Ordering::Release);
            tracing::debug!(old = offset, new = corrected, "clock offset corrected");
            return client_now;
        }
        candidate
    }

    /// Maps a client stamp into server time.
    pub fn server_timestamp(&self, client_ts: i64) -> i64 {
        client_ts.wrapping_sub(self.offset())
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

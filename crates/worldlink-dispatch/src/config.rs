//! Drain limits.

use std::time::Duration;

/// Bounds on one [`Dispatcher::drain`](crate::Dispatcher::drain) call.
///
/// Zero means unbounded for either field. A drain stops *starting* new
/// messages once a bound is reached; a handler already running is never
/// interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainLimits {
    pub max_messages: usize,
    pub max_time: Duration,
}

impl DrainLimits {
    /// Drain until the queue is empty.
    pub const UNBOUNDED: Self = Self {
        max_messages: 0,
        max_time: Duration::ZERO,
    };

    pub fn new(max_messages: usize, max_time: Duration) -> Self {
        Self {
            max_messages,
            max_time,
        }
    }

    pub fn messages(max_messages: usize) -> Self {
        Self {
            max_messages,
            ..Self::UNBOUNDED
        }
    }

    pub fn time(max_time: Duration) -> Self {
        Self {
            max_time,
            ..Self::UNBOUNDED
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_messages == 0 && self.max_time.is_zero()
    }

    /// Whether a drain that has handled `processed` messages in `elapsed`
    /// must stop.
    pub fn reached(&self, processed: usize, elapsed: Duration) -> bool {
        (self.max_messages > 0 && processed >= self.max_messages)
            || (!self.max_time.is_zero() && elapsed >= self.max_time)
    }
}

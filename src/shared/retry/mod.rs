//! Fixed-interval retry policy shared by every poll/retry loop.
//!
//! An optional different first delay, then a constant interval forever.
//! Loops using it stop only when their lifetime ends.

use std::time::Duration;

/// Retry schedule: `first`, then `interval`, `interval`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first attempt.
    pub first: Duration,
    /// Delay before every following attempt.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Same delay before every attempt, the first one included.
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            first: interval,
            interval,
        }
    }

    /// First attempt right away, then every `interval`.
    pub const fn immediate(interval: Duration) -> Self {
        Self {
            first: Duration::ZERO,
            interval,
        }
    }

    /// Returns the delay for the given attempt number (0-indexed).
    pub fn delay(&self, attempt: u64) -> Duration {
        if attempt == 0 {
            self.first
        } else {
            self.interval
        }
    }

    /// Endless iterator over the schedule.
    pub fn delays(&self) -> Delays {
        Delays {
            policy: *self,
            attempt: 0,
        }
    }
}

/// Iterator returned by [`RetryPolicy::delays`]. Never yields `None`.
#[derive(Debug, Clone)]
pub struct Delays {
    policy: RetryPolicy,
    attempt: u64,
}

impl Delays {
    /// Number of delays handed out so far.
    pub fn attempts(&self) -> u64 {
        self.attempt
    }
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }
}

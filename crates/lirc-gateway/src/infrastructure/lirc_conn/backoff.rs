//! Exponential reconnect backoff.

use std::time::Duration;

/// Reconnect timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub multiplier: u32,
    /// Consecutive failed attempts before giving up. `0` retries forever.
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            max_retries: 10,
        }
    }
}

/// Produces the delays between consecutive reconnect attempts.
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            next: policy.initial_delay,
            policy,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` once `max_retries` attempts
    /// have been handed out since the last [`reset`](Self::reset).
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.policy.max_retries != 0 && self.attempts >= self.policy.max_retries {
            return None;
        }
        self.attempts += 1;
        let delay = self.next;
        self.next = delay
            .saturating_mul(self.policy.multiplier)
            .min(self.policy.max_delay);
        Some(delay)
    }

    /// Called after a successful connect.
    pub fn reset(&mut self) {
        self.next = self.policy.initial_delay;
        self.attempts = 0;
    }

    /// Attempts handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

//! Timing policy — every interval, timeout, and retry bound in one
//! explicitly owned value.
//!
//! Components take a [`TimingPolicy`] (or the fields they need) at
//! construction instead of reading module-level constants, so tests can
//! shrink every delay to milliseconds.

use std::time::Duration;

/// Timing constants for snapshot distribution and connection supervision.
///
/// Defaults are the production policy; they are policy, not protocol.
#[derive(Debug, Clone)]
pub struct TimingPolicy {
    /// Interval between snapshot pushes to one subscriber.
    pub push_cadence: Duration,

    /// How long the subscriber waits for the push channel to open.
    pub connect_timeout: Duration,

    /// Push channel open attempts before falling back to polling.
    pub max_push_retries: u32,

    /// First retry backoff delay; doubles per attempt.
    pub backoff_base: Duration,

    /// Upper bound on the backoff delay.
    pub backoff_cap: Duration,

    /// Interval between pull requests once in polling mode.
    pub poll_interval: Duration,

    /// A device is stale once silent longer than this.
    pub staleness_threshold: Duration,

    /// Device store attempts before the snapshot path degrades.
    pub store_retry_attempts: u32,

    /// Fixed delay between device store attempts.
    pub store_retry_delay: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            push_cadence: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_push_retries: 2,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(5),
            poll_interval: Duration::from_secs(30),
            staleness_threshold: Duration::from_secs(10 * 60),
            store_retry_attempts: 3,
            store_retry_delay: Duration::from_millis(500),
        }
    }
}

impl TimingPolicy {
    /// Backoff delay before retry number `attempt` (zero-based):
    /// `min(base * 2^attempt, cap)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.backoff_base.saturating_mul(factor).min(self.backoff_cap)
    }

    /// A policy with every delay shrunk to milliseconds, for tests and
    /// local demos. Retry bounds keep their production values.
    pub fn fast() -> Self {
        Self {
            push_cadence: Duration::from_millis(50),
            connect_timeout: Duration::from_millis(200),
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(40),
            poll_interval: Duration::from_millis(50),
            store_retry_delay: Duration::from_millis(5),
            ..Self::default()
        }
    }
}

//! How often a delivery is re-sent after a transport failure, and how long
//! the dispatcher waits in between.
//!
//! Only failures to get an answer count: connection errors, timeouts and I/O
//! errors. Once a subscriber answers, its status ends the attempts for that
//! endpoint whatever the code.

use std::time::Duration;

/// Re-send budget and back-off for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Re-sends after the first attempt. `0` means a single attempt.
    pub max_retries: u32,

    /// Wait after the first failed attempt.
    pub base_delay: Duration,

    /// Upper bound on any single wait.
    pub max_delay: Duration,

    /// Factor applied to the wait after each further failure.
    pub growth: f64,
}

impl RetryConfig {
    /// 3 re-sends, waiting 100ms, 200ms, then 400ms; never more than 2s.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
        growth: 2.0,
    };

    /// Default back-off with a different re-send budget.
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::DEFAULT
        }
    }

    /// Wait before the attempt that follows failed attempt number `failed`
    /// (1-based).
    pub fn backoff(&self, failed: u32) -> Duration {
        let exponent = i32::try_from(failed.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.growth.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Total attempts allowed under `policy`, the first one included.
    pub fn max_attempts(&self, policy: RetryPolicy) -> u32 {
        match policy {
            RetryPolicy::RetryTransient => self.max_retries.saturating_add(1),
            RetryPolicy::NoRetry => 1,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whether transport failures are re-sent at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Re-send within the [`RetryConfig`] budget.
    #[default]
    RetryTransient,

    /// One attempt, whatever happens.
    NoRetry,
}

//! Runtime cache policy types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Staleness window screens use unless they declare their own.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Upper bound on a single remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Retry configuration for remote reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 1);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// How a read treats cached data and the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// A Fresh entry younger than this is served without a network call.
    pub stale_time: Duration,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl CachePolicy {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = CachePolicy::default();
        assert_eq!(policy.stale_time, Duration::from_secs(300));
        assert_eq!(policy.retry.max_retries, 2);
        assert_eq!(policy.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(3),
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.backoff_for(0), Duration::ZERO);
        assert_eq!(retry.backoff_for(1), Duration::from_millis(500));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(retry.backoff_for(4), Duration::from_secs(3));
    }

    #[test]
    fn test_builder() {
        let policy = CachePolicy::default()
            .with_stale_time(Duration::from_secs(10))
            .with_retry(RetryPolicy::none())
            .with_timeout(Duration::from_secs(1));
        assert_eq!(policy.stale_time, Duration::from_secs(10));
        assert_eq!(policy.retry.max_retries, 0);
        assert_eq!(policy.timeout, Duration::from_secs(1));
    }
}

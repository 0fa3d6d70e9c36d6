// ABOUTME: Retry policy for send attempts: attempt ceiling plus exponential backoff.
// ABOUTME: Built from DeliveryConfig; also holds the fallback wait for 429 replies.

use std::time::Duration;

use crate::config::DeliveryConfig;

/// Retry tuning for one message send.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed for transient transport failures, first attempt included.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles for each retry after that.
    pub base_delay: Duration,
    /// Wait after a 429 that carried no Retry-After header.
    pub throttle_fallback: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for RetryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: secs(config.retry_delay_secs),
            throttle_fallback: secs(config.throttle_fallback_secs),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0 for the first retry).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            throttle_fallback: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            throttle_fallback: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(40), Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_from_delivery_config() {
        let config = DeliveryConfig {
            max_retries: 0,
            retry_delay_secs: 2.0,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
    }
}

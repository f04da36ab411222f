//! Retry strategy applied to a single action before its fallbacks run.

use tokio::time::Duration;
use webpilot_registry::RegistryError;

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_MS: u64 = 10_000;

/// Exponential backoff over an action's retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(250)
    }
}

impl RetryPolicy {
    pub fn new(base_backoff_ms: u64) -> Self {
        Self {
            base_backoff_ms,
            max_backoff_ms: MAX_BACKOFF_MS,
        }
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn should_retry(&self, error: &RegistryError, attempt: u32, max_retries: u32) -> bool {
        attempt <= max_retries && error.is_retryable()
    }

    /// Delay before retrying after attempt `attempt`: `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1));
        let total_ms = self.base_backoff_ms.saturating_mul(multiplier);
        Duration::from_millis(total_ms.min(self.max_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::EngineError;
    use webpilot_core_types::EngineKind;

    #[test]
    fn test_calculate_backoff() {
        let policy = RetryPolicy::new(1000);

        assert_eq!(policy.backoff(1).as_millis(), 1000);
        assert_eq!(policy.backoff(2).as_millis(), 2000);
        assert_eq!(policy.backoff(3).as_millis(), 4000);
        assert_eq!(policy.backoff(4).as_millis(), 8000);

        // Capped
        assert_eq!(policy.backoff(10).as_millis(), 10_000);
        assert_eq!(policy.backoff(200).as_millis(), 10_000);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        let timeout = RegistryError::engine(EngineKind::Cdp, EngineError::Timeout("slow".into()));
        let script = RegistryError::engine(EngineKind::Cdp, EngineError::Script("boom".into()));
        let routing = RegistryError::NoEngineAvailable {
            preference: EngineKind::Auto,
        };

        assert!(policy.should_retry(&timeout, 1, 2));
        assert!(policy.should_retry(&timeout, 2, 2));
        assert!(!policy.should_retry(&timeout, 3, 2));
        assert!(!policy.should_retry(&timeout, 1, 0));

        assert!(!policy.should_retry(&script, 1, 5));
        assert!(!policy.should_retry(&routing, 1, 5));
    }
}

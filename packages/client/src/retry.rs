//! Retry policy shared by the pollers.
//!
//! Pure decision functions with no side effects; the pollers own the
//! failure counters and the sleeping.

use std::time::Duration;

/// Default number of consecutive failed reads tolerated before a poller gives up
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;
/// Default upper bound for a single backoff delay
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded exponential backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures after which the poller surfaces a failure
    pub max_consecutive_failures: u32,
    /// Delay used while the poller is healthy
    pub base_delay: Duration,
    /// Upper bound for any delay returned by [`RetryPolicy::backoff`]
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the default failure bound and backoff cap
    pub fn new(base_delay: Duration) -> Self {
        Self {
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            base_delay,
            max_delay: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Override the consecutive failure bound
    pub fn with_max_consecutive_failures(mut self, max_consecutive_failures: u32) -> Self {
        self.max_consecutive_failures = max_consecutive_failures;
        self
    }

    /// Override the backoff cap
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the next attempt after `consecutive_failures` failed reads.
    ///
    /// # Returns
    ///
    /// `base_delay` when there is no failure, otherwise
    /// `base_delay * 2^(consecutive_failures - 1)` capped at `max_delay`
    pub fn backoff(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.base_delay.min(self.max_delay);
        }

        let exponent = (consecutive_failures - 1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Check if the poller should stop retrying.
    ///
    /// A bound of 0 is treated as 1: the first failure stops the poller.
    ///
    /// # Arguments
    ///
    /// * `consecutive_failures` - Failed reads since the last success
    pub fn should_give_up(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.max_consecutive_failures.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(2)).with_max_delay(Duration::from_secs(30))
    }

    #[test]
    fn test_backoff_without_failures_is_base_delay() {
        // テスト項目: 失敗がない場合は基本間隔が返される
        // given (前提条件):
        let policy = policy();

        // when (操作):
        let delay = policy.backoff(0);

        // then (期待する結果):
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_doubles_per_failure() {
        // テスト項目: 連続失敗ごとに待機時間が倍になる
        // given (前提条件):
        let policy = policy();

        // when (操作):
        let delays: Vec<Duration> = (1..=4).map(|n| policy.backoff(n)).collect();

        // then (期待する結果):
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        // テスト項目: 待機時間は上限を超えない
        // given (前提条件):
        let policy = policy();

        // when (操作):
        let delay = policy.backoff(6);
        let huge = policy.backoff(u32::MAX);

        // then (期待する結果):
        assert_eq!(delay, Duration::from_secs(30));
        assert_eq!(huge, Duration::from_secs(30));
    }

    #[test]
    fn test_should_give_up_below_limit() {
        // テスト項目: 失敗回数が上限未満の場合はリトライを続ける
        // given (前提条件):
        let policy = policy().with_max_consecutive_failures(5);

        // when (操作):
        let result = policy.should_give_up(4);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_give_up_at_limit() {
        // テスト項目: 失敗回数が上限に達した場合はリトライを止める
        // given (前提条件):
        let policy = policy().with_max_consecutive_failures(5);

        // when (操作):
        let result = policy.should_give_up(5);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_zero_bound_gives_up_on_first_failure() {
        // テスト項目: 失敗上限 0 は 1 として扱われ、失敗前は続行し最初の失敗で止まる
        // given (前提条件):
        let policy = policy().with_max_consecutive_failures(0);

        // when (操作):
        let results = (policy.should_give_up(0), policy.should_give_up(1));

        // then (期待する結果):
        assert_eq!(results, (false, true));
    }
}

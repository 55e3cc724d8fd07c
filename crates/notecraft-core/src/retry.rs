//! Bounded polling with optional backoff.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Source of non-blocking delays.
///
/// Browser builds sleep on the event loop; tests use tokio's paused clock.
#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

/// How many times to probe and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of probes, including the first.
    pub max_attempts: u32,
    /// Wait before the second probe.
    pub initial_delay: Duration,
    /// Each subsequent wait is multiplied by this factor (1 = fixed delay).
    pub backoff_factor: u32,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            backoff_factor: 1,
            max_delay: delay,
        }
    }

    pub fn with_backoff(mut self, factor: u32, max_delay: Duration) -> Self {
        self.backoff_factor = factor.max(1);
        self.max_delay = max_delay;
        self
    }

    /// Wait after the `attempt`-th failed probe (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay.max(self.initial_delay))
    }

    /// Sum of every wait the policy can incur.
    pub fn total_budget(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .sum()
    }
}

impl Default for RetryPolicy {
    /// 50 probes, 100ms apart.
    fn default() -> Self {
        Self::fixed(50, Duration::from_millis(100))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gave up after {attempts} attempts")]
pub struct RetryExhausted {
    pub attempts: u32,
}

/// Probe until it yields a value or the policy runs out.
pub async fn poll_until<T, F>(
    policy: &RetryPolicy,
    timer: &impl Timer,
    mut probe: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Option<T>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        if let Some(value) = probe() {
            if attempt > 0 {
                tracing::debug!(attempt = attempt + 1, "Probe succeeded after retrying");
            }
            return Ok(value);
        }
        if attempt + 1 < attempts {
            timer.sleep(policy.delay_for(attempt)).await;
        }
    }
    Err(RetryExhausted { attempts })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Timer backed by tokio's clock, so `start_paused` tests advance instantly.
    pub(crate) struct TokioTimer;

    #[async_trait(?Send)]
    impl Timer for TokioTimer {
        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }

    #[test]
    fn test_fixed_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(30), Duration::from_millis(100));
        assert_eq!(policy.total_budget(), Duration::from_millis(4900));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::fixed(6, Duration::from_millis(100))
            .with_backoff(2, Duration::from_millis(500));

        let delays: Vec<_> = (0..5).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_first_value() {
        let calls = Cell::new(0);
        let start = tokio::time::Instant::now();

        let value = poll_until(&RetryPolicy::default(), &TokioTimer, || {
            calls.set(calls.get() + 1);
            (calls.get() == 3).then_some("ready")
        })
        .await;

        assert_eq!(value, Ok("ready"));
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts_budget() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::fixed(5, Duration::from_millis(10));
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = poll_until(&policy, &TokioTimer, || {
            calls.set(calls.get() + 1);
            None
        })
        .await;

        assert_eq!(result, Err(RetryExhausted { attempts: 5 }));
        assert_eq!(calls.get(), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(40));
    }
}

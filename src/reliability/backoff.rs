//! Backoff policies and the sleeper used between retries.

use std::time::Duration;

use async_trait::async_trait;

/// Maps the number of failed attempts so far (1-based) to the delay before
/// the next attempt.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`, with
/// optional jitter scaling each delay to 50-100% of its nominal value.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Create a jittered exponential backoff.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: true,
        }
    }

    /// Disable jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before jitter is applied.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_secs_f64(crate::DEFAULT_BASE_BACKOFF_SECONDS),
            Duration::from_secs_f64(crate::DEFAULT_MAX_BACKOFF_SECONDS),
        )
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if !self.jitter {
            return nominal;
        }

        let jitter_factor = 0.5 + (rand::random::<f64>() * 0.5);
        nominal.mul_f64(jitter_factor)
    }
}

/// Suspends the caller between retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_doubles_from_base() {
        let backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60)).without_jitter();
        let delays: Vec<u64> = (1..=5).map(|a| backoff.delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_capped_at_max() {
        let backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10)).without_jitter();
        assert_eq!(backoff.delay(5), Duration::from_secs(10));
        assert_eq!(backoff.delay(200), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_half_to_full() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(4), Duration::from_secs(60));
        for _ in 0..100 {
            let delay = backoff.delay(2);
            assert!(delay >= Duration::from_secs(4) && delay <= Duration::from_secs(8));
        }
    }

    #[test]
    fn test_closures_are_backoffs() {
        let fixed = |_attempt: u32| Duration::from_millis(5);
        assert_eq!(fixed.delay(3), Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(3)).await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}

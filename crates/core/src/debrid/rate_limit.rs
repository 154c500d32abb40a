//! Minimum-interval rate limiting for debrid provider APIs.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum gap between consecutive calls.
///
/// One limiter instance is shared (via `Arc`) by every call site talking to
/// the same provider, so the gap holds across concurrent tasks. The lock is
/// held for the duration of the wait, which serializes callers in arrival
/// order.
pub struct IntervalLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    /// Create a limiter with the given minimum gap between calls.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the minimum interval since the previous call has elapsed,
    /// then record this call.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = IntervalLimiter::new(Duration::from_millis(250));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_waits_for_interval() {
        let limiter = IntervalLimiter::new(Duration::from_millis(250));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_interval_means_no_wait() {
        let limiter = IntervalLimiter::new(Duration::from_millis(250));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_millis(300)).await;

        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spaced() {
        let limiter = Arc::new(IntervalLimiter::new(Duration::from_millis(100)));
        let start = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed: Vec<Duration> = Vec::new();
        for task in tasks {
            elapsed.push(task.await.unwrap());
        }
        elapsed.sort();

        // Three callers, two enforced gaps.
        assert!(elapsed[1] >= Duration::from_millis(100));
        assert!(elapsed[2] >= Duration::from_millis(200));
    }
}

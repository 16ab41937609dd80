use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one poll attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep<T> {
    Ready(T),
    Pending,
}

/// Exponential backoff with a hard deadline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            backoff_multiplier: 1.5,
            max_wait: Duration::from_secs(5 * 60),
        }
    }
}

impl PollPolicy {
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.backoff_multiplier.max(1.0))
            .min(self.max_interval)
    }

    /// Run `check` until it is ready or `max_wait` elapses.
    ///
    /// On timeout returns the time spent waiting.
    pub async fn poll<T, F, Fut>(&self, mut check: F) -> Result<T, Duration>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollStep<T>>,
    {
        let started = Instant::now();
        let mut interval = self.initial_interval;

        loop {
            if let PollStep::Ready(value) = check().await {
                return Ok(value);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.max_wait {
                return Err(elapsed);
            }

            tokio::time::sleep(interval.min(self.max_wait - elapsed)).await;
            interval = self.next_interval(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_backoff_is_capped() {
        let policy = PollPolicy::default();
        let mut interval = policy.initial_interval;
        let mut seen = vec![interval];
        for _ in 0..8 {
            interval = policy.next_interval(interval);
            seen.push(interval);
        }
        assert_eq!(seen[1], Duration::from_millis(1500));
        assert_eq!(seen[2], Duration::from_millis(2250));
        assert_eq!(*seen.last().unwrap(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_when_ready() {
        let attempts = AtomicUsize::new(0);
        let result = PollPolicy::default()
            .poll(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 2 {
                    PollStep::Ready("done")
                } else {
                    PollStep::Pending
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out() {
        let policy = PollPolicy {
            max_wait: Duration::from_secs(30),
            ..PollPolicy::default()
        };
        let started = Instant::now();

        let result: Result<(), Duration> = policy.poll(|| async { PollStep::Pending }).await;

        let waited = result.unwrap_err();
        assert!(waited >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(31));
    }
}

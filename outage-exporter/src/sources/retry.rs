use std::time::Duration;

use crate::pipeline::FetchError;

/// Retry-with-exponential-backoff wrapper for upstream fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }

    pub fn run<T, F>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Result<T, FetchError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 1;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let sleep_for = self.backoff_for(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        backoff_ms = sleep_for.as_millis() as u64,
                        "upstream fetch failed, retrying with backoff"
                    );
                    metrics::counter!("outage_fetch_retries_total").increment(1);
                    std::thread::sleep(sleep_for);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

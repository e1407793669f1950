//! Retry with exponential backoff for search provider calls

use std::future::Future;
use std::time::{Duration, Instant, SystemTime};

/// Retry policy for provider fetches
///
/// Controls how many attempts a fetch gets in total and how long to wait
/// between them. Delays double after each failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Add 0-25% jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

/// How a single provider call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    ConnectionError,
    HttpError(u16),
    Malformed,
}

/// Transient record of one provider call, used for logging and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub latency: Duration,
}

impl FetchAttempt {
    /// Emit the attempt as a structured log line
    pub fn log(&self, query: &str) {
        #[allow(clippy::cast_possible_truncation)]
        let latency_ms = self.latency.as_millis() as u64;

        if self.outcome == AttemptOutcome::Success {
            tracing::debug!(query, attempt = self.attempt, latency_ms, "provider fetch succeeded");
        } else {
            tracing::warn!(
                query,
                attempt = self.attempt,
                latency_ms,
                outcome = ?self.outcome,
                "provider fetch failed"
            );
        }
    }
}

/// Final failure of a retried operation
#[derive(Debug)]
pub struct RetryError<E> {
    /// Error from the last attempt
    pub error: E,
    /// Attempts made
    pub attempts: u32,
    /// True when every attempt failed with a retryable error
    pub exhausted: bool,
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Compute the delay after failed attempt number `attempt` (1-based)
    ///
    /// The delay follows exponential backoff:
    /// `min(base_delay * 2^(attempt - 1) + jitter, max_delay)`.
    ///
    /// Jitter is 0-25% of the computed delay, derived from `SystemTime` to
    /// avoid pulling in a full random number generator.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        if !self.jitter {
            return base;
        }

        let jitter_nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();

        let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
        let jitter = base.mul_f64(jitter_fraction);

        (base + jitter).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out
    ///
    /// `op` receives the 1-based attempt number. Sleeps between attempts use
    /// the tokio timer, so only the calling task waits.
    ///
    /// # Errors
    ///
    /// Returns the last error together with the attempt count
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let retryable = is_retryable(&error);
                    if !retryable || attempt >= max_attempts {
                        return Err(RetryError {
                            error,
                            attempts: attempt,
                            exhausted: retryable,
                        });
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Time a future, returning its output and elapsed wall time
pub(crate) async fn timed<T>(fut: impl Future<Output = T>) -> (T, Duration) {
    let started = Instant::now();
    let out = fut.await;
    (out, started.elapsed())
}

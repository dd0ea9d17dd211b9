//! Exponential backoff around a single fetch attempt

use crate::config::RetrySettings;
use crate::crawler::strategy::FetchError;
use std::future::Future;
use std::time::Duration;

/// Retry parameters for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

/// Final error after the policy gave up
#[derive(Debug, Clone)]
pub struct RetryFailure {
    pub last_error: FetchError,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, where `attempt` is 1-based
    ///
    /// Doubles from `initial_backoff` and never exceeds `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, url: &str, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_retryable() || attempt >= self.max_attempts => {
                    return Err(RetryFailure {
                        last_error: error,
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    let wait = self.backoff_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        url,
                        error,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

//! Bounded retry for fallible async operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Default multiplier applied to the delay after each failed attempt.
pub const DEFAULT_BACKOFF: u32 = 2;

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    #[serde(rename = "delay_ms", deserialize_with = "crate::config::millis")]
    pub delay: Duration,

    /// Delay multiplier between consecutive attempts.
    pub backoff: u32,
}

impl RetryPolicy {
    /// A policy that retries immediately, without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            backoff: 1,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.saturating_pow(attempt.saturating_sub(1));
        self.delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are exhausted.
///
/// The error of the last attempt is returned. Earlier failures are only
/// logged.
pub async fn retry<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    description: &str,
    mut operation: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        "{} succeeded on attempt {}/{}",
                        description,
                        attempt,
                        max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                    description,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    "{} failed after {} attempt(s): {}",
                    description,
                    attempt,
                    e
                );
                return Err(e);
            }
        }
    }
}

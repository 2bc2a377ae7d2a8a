//! Retry logic with exponential backoff for remote operations.
//!
//! Whether a failure is retried is decided by [`Error::kind`], never by
//! inspecting messages. Only [`ErrorKind::Transient`] failures are retried.
//!
//! [`ErrorKind::Transient`]: crate::error::ErrorKind::Transient

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Whether to add up to 25% jitter to each delay.
    pub add_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            add_jitter: false,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            add_jitter: settings.jitter,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with no retries (for testing or when retries are unwanted).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            add_jitter: false,
        }
    }

    /// Delay to wait after the failed attempt number `attempt` (0-based):
    /// `base * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32);
        let delay = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());

        let final_delay = if self.add_jitter {
            delay + delay * 0.25 * rand_jitter()
        } else {
            delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0) without external dependencies.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Runs `operation` until it succeeds, fails fatally, or runs out of attempts.
///
/// Fatal errors are returned unchanged. When every attempt failed with a
/// retryable error the last one is wrapped in [`Error::RetriesExhausted`].
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{}: succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if !e.kind().is_retryable() => return Err(e),
            Err(e) => {
                if attempt + 1 >= max_attempts {
                    return Err(Error::RetriesExhausted {
                        operation: operation_name.to_string(),
                        attempts: attempt + 1,
                        source: Box::new(e),
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "{}: retryable error (attempt {}/{}), retrying in {:?}: {}",
                    operation_name,
                    attempt + 1,
                    max_attempts,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

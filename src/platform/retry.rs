//! Bounded retry with exponential backoff
//!
//! Transient platform errors (rate limit, timeout, 5xx) are retried up to a
//! configured ceiling within a single cadence tick. Exhausting retries
//! degrades the tick; it never crashes the loop.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::PlatformError;

/// Retry policy for transient platform errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts (1 = no retry)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each attempt
    pub base_delay: Duration,
    /// Ceiling on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), with jitter.
    /// A server-provided retry-after overrides the exponential schedule.
    fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(secs) = retry_after {
            return Duration::from_secs(secs).min(self.max_delay);
        }
        let exp = self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
        let capped = exp.min(self.max_delay);
        // up to 25% jitter to avoid thundering herds on shared limits
        let jitter = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 4);
        capped + Duration::from_millis(jitter)
    }
}

/// Run `op` with the given policy, retrying transient failures.
///
/// Permanent errors return immediately; the last transient error is
/// returned once attempts are exhausted.
pub async fn with_backoff<T, F, Fut>(
    op_name: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let retry_after = match &err {
                    PlatformError::RateLimited { retry_after } => Some(*retry_after),
                    _ => None,
                };
                let delay = policy.delay_for(attempt, retry_after);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    op_name, attempt, policy.max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!("{} giving up after attempt {}: {}", op_name, attempt, err);
                return Err(err);
            }
        }
    }
}

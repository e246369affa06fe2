//! Bounded retry with uniformly jittered delays.
//!
//! Only `TransientProvider` errors are retried. Anything else, including
//! `AlreadyExists`, goes straight back to the caller.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use ragstack_contracts::error::ProvisionResult;

use crate::traits::Sleeper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls allowed, including the first. Treated as 1 when 0.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// A delay drawn uniformly from `[min_delay, max_delay]`.
    pub fn jittered_delay(&self) -> Duration {
        let lo = self.min_delay.as_millis() as u64;
        let hi = self.max_delay.as_millis() as u64;
        if hi <= lo {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

/// Run `call` until it succeeds, fails non-transiently, or the attempt
/// budget is spent.
///
/// `call` receives the 1-based attempt number. When the budget runs out the
/// error of the last attempt is returned.
pub fn retry_transient<T, F>(
    operation: &str,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut call: F,
) -> ProvisionResult<T>
where
    F: FnMut(u32) -> ProvisionResult<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.jittered_delay();
                warn!(
                    operation = %operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                sleeper.sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Fixed-interval status polling with an attempt cap.

use std::time::Duration;

use tracing::{debug, warn};

use ragstack_contracts::error::{ProvisionError, ProvisionResult};

use crate::traits::Sleeper;

/// How often and how many times a poll site may check a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Total status checks allowed, including the first. Treated as 1 when 0.
    pub max_polls: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_polls: u32) -> Self {
        Self { interval, max_polls }
    }
}

/// What one status check observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    /// Not terminal yet; the string is the status reported, for logs and
    /// the timeout error.
    Pending(String),
    /// Terminal; polling stops and this value is returned.
    Ready(T),
}

/// Call `check` until it reports `Ready`, sleeping `policy.interval` between
/// calls.
///
/// The first check runs immediately. Transient errors count as a pending
/// check. Any other error from `check` is returned as-is. After
/// `policy.max_polls` checks without `Ready`, returns `ProvisioningTimeout`.
/// `check` is never called again once it has returned `Ready`.
pub fn poll_until<T, F>(
    resource: &str,
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    mut check: F,
) -> ProvisionResult<T>
where
    F: FnMut() -> ProvisionResult<PollState<T>>,
{
    let max_polls = policy.max_polls.max(1);
    let mut last_status = String::from("unknown");

    for attempt in 1..=max_polls {
        match check() {
            Ok(PollState::Ready(value)) => {
                debug!(resource = %resource, attempt, "poll reached terminal status");
                return Ok(value);
            }
            Ok(PollState::Pending(status)) => {
                debug!(resource = %resource, attempt, status = %status, "still waiting");
                last_status = status;
            }
            Err(e) if e.is_transient() => {
                warn!(resource = %resource, attempt, error = %e, "status check failed, will retry");
                last_status = format!("error: {e}");
            }
            Err(e) => return Err(e),
        }

        if attempt < max_polls {
            sleeper.sleep(policy.interval);
        }
    }

    Err(ProvisionError::ProvisioningTimeout {
        resource: resource.to_string(),
        attempts: max_polls,
        last_status,
    })
}

//! Bounded polling of external long-running operations.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{AssemblyError, PipelineResult};

/// Fixed-interval polling with a hard attempt limit.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Call `check` until it yields a value, at most `policy.attempts` times.
///
/// Errors from `check` end the poll immediately. Running out of attempts is
/// [`AssemblyError::Timeout`].
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, what: &str, mut check: F) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PipelineResult<Option<T>>>,
{
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        debug!(attempt, attempts, "{} not ready", what);
        if attempt < attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(AssemblyError::Timeout(format!(
        "{what} not ready after {attempts} attempts"
    )))
}

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::RetrySchedule;

/// Classifies a failure as transient (worth retrying) or fatal.
pub trait Retryable {
    /// Returns `true` if running the same operation again may succeed.
    fn should_retry(&self) -> bool;
}

/// Low-level I/O failures (connection resets, timeouts, short reads) are
/// always treated as transient.
impl Retryable for std::io::Error {
    fn should_retry(&self) -> bool {
        true
    }
}

/// Runs an attempt closure according to a [`RetrySchedule`].
///
/// ```ignore
/// let executor = RetryExecutor::new(RetrySchedule::from_millis(&[500, 1000, 2000]));
/// executor
///     .make_attempts(|_attempt| async {
///         let mut transfer = client.resume_or_create_upload(&upload).await?;
///         while transfer.transfer_chunk().await? > 0 {}
///         transfer.finish().await
///     })
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    schedule: RetrySchedule,
}

impl RetryExecutor {
    pub fn new(schedule: RetrySchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    pub fn set_schedule(&mut self, schedule: RetrySchedule) {
        self.schedule = schedule;
    }

    /// Calls `attempt` (with the 0-based attempt index) until it succeeds,
    /// fails with a non-retryable error, or the schedule is exhausted.
    ///
    /// The returned error is the one produced by the last attempt, passed
    /// through unchanged.
    pub async fn make_attempts<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut index: u32 = 0;
        loop {
            match attempt(index).await {
                Ok(value) => return Ok(value),
                Err(err) => match self.retry_delay(index, &err) {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return Err(err),
                },
            }
            index = index.saturating_add(1);
        }
    }

    /// Like [`make_attempts`](Self::make_attempts), but gives up quietly
    /// when `cancel` fires.
    ///
    /// Returns `Ok(None)` if the token was cancelled before an attempt or
    /// while waiting for the next retry. An attempt that is already running
    /// is not interrupted.
    pub async fn make_attempts_with_cancel<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<Option<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut index: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                debug!(attempt = index, "retry cancelled");
                return Ok(None);
            }

            match attempt(index).await {
                Ok(value) => return Ok(Some(value)),
                Err(err) => {
                    let Some(delay) = self.retry_delay(index, &err) else {
                        return Err(err);
                    };
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(attempt = index, "retry cancelled while waiting");
                            return Ok(None);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
            index = index.saturating_add(1);
        }
    }

    /// Decides whether the failed attempt `index` gets another try, and
    /// after which delay.
    fn retry_delay<E: Retryable + Display>(&self, index: u32, err: &E) -> Option<Duration> {
        if !err.should_retry() {
            debug!(attempt = index, error = %err, "attempt failed, not retryable");
            return None;
        }
        match self.schedule.delay_before(index.saturating_add(1)) {
            Some(delay) => {
                warn!(
                    attempt = index,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying"
                );
                Some(delay)
            }
            None => {
                warn!(
                    attempts = index as u64 + 1,
                    error = %err,
                    "retry schedule exhausted"
                );
                None
            }
        }
    }
}

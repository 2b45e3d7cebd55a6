//! Bounded retry with rate-limit recovery
//!
//! The delay between attempts is fixed. Rate-limited attempts never consume
//! the budget: they reset the counter and simply wait.

use crate::seeker::detail::{FailureKind, FetchError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry configuration for one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Counted retries after the first attempt, 0 = unlimited
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub interval: Duration,
}

/// Per-id retry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far, rate-limited ones included
    pub attempt: u32,
    /// Counted failures since the last rate limit
    pub since_rate_limit: u32,
}

/// Final result of running one id through the policy
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    /// Budget exhausted, carries the last error
    Exhausted(FetchError),
    /// Failure not worth retrying
    Skipped(FetchError),
    Cancelled,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Wait,
    GiveUp,
    Skip,
    Stop,
}

impl RetryState {
    fn record_failure(&mut self, kind: FailureKind, max_retries: u32) -> Step {
        match kind {
            FailureKind::Cancelled => Step::Stop,
            FailureKind::Fatal => Step::Skip,
            FailureKind::RateLimited => {
                self.since_rate_limit = 0;
                Step::Wait
            }
            FailureKind::Retryable => {
                if max_retries > 0 && self.since_rate_limit >= max_retries {
                    Step::GiveUp
                } else {
                    self.since_rate_limit += 1;
                    Step::Wait
                }
            }
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Runs `attempt` until it succeeds, the budget is spent, or `cancel` fires
    ///
    /// The wait between attempts races against `cancel`, so a cancelled run
    /// never sits out a full interval.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Cancellation signal of the run
    /// * `attempt` - Produces one attempt; receives the current state
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(RetryState) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut state = RetryState::default();

        loop {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }

            let err = match attempt(state).await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(err) => err,
            };
            state.attempt += 1;

            match state.record_failure(err.kind(), self.max_retries) {
                Step::Stop => return RetryOutcome::Cancelled,
                Step::Skip => return RetryOutcome::Skipped(err),
                Step::GiveUp => return RetryOutcome::Exhausted(err),
                Step::Wait => {
                    tracing::debug!(
                        "Attempt {} failed ({}), {} counted, retrying in {:?}",
                        state.attempt,
                        err,
                        state.since_rate_limit,
                        self.interval
                    );
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

use super::fetcher::{FetchError, RetryingFetcher};
use crate::github::CheckRun;
use log::info;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How waiting on a check ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    Success(CheckRun),
    Failure(CheckRun),
    TimedOut,
}

pub struct PollingEngine {
    fetcher: RetryingFetcher,
    interval: Duration,
}

impl PollingEngine {
    pub fn new(fetcher: RetryingFetcher, interval: Duration) -> Self {
        Self { fetcher, interval }
    }

    /// Polls `check_id` until it completes or `deadline` passes.
    ///
    /// The deadline is only looked at between polls. Running out of fetch attempts is an error
    /// rather than a timeout, since it says nothing about whether the check is still running.
    pub async fn wait_until_complete(
        &self,
        check_id: u64,
        deadline: Instant,
    ) -> Result<PollResult, FetchError> {
        info!(
            "Waiting for check {} to complete ({}s timeout) ...",
            check_id,
            remaining(deadline).as_secs()
        );
        loop {
            let check = match self.fetcher.fetch(check_id, deadline).await {
                Ok(check) => check,
                Err(FetchError::DeadlineElapsed { .. }) => return Ok(PollResult::TimedOut),
                Err(e) => return Err(e),
            };
            info!(
                "    Check status ({:.1}s remaining) ... {}",
                remaining(deadline).as_secs_f64(),
                check.status
            );
            if check.is_completed() {
                return Ok(if check.succeeded() {
                    PollResult::Success(check)
                } else {
                    PollResult::Failure(check)
                });
            }
            if Instant::now() >= deadline {
                return Ok(PollResult::TimedOut);
            }
            sleep(self.interval).await;
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

use crate::client;
use crate::github::{CheckRun, GithubClient, RepoIdentifier};
use log::warn;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout_at, Instant};

/// How many times a check is fetched, and how long to wait in between, before giving up.
///
/// The delay is fixed: the failures this is meant to absorb are short lived read-after-write
/// inconsistencies rather than load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("exceeded {attempts} attempts fetching check {check_id}: {source}")]
    Exhausted {
        check_id: u64,
        attempts: u32,
        source: client::Error,
    },

    #[error("deadline elapsed while fetching check {check_id}: {source}")]
    DeadlineElapsed { check_id: u64, source: client::Error },
}

/// Fetches the current state of a check run, retrying failed requests.
#[derive(Clone)]
pub struct RetryingFetcher {
    github: Arc<dyn GithubClient>,
    repo: RepoIdentifier,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(github: Arc<dyn GithubClient>, repo: RepoIdentifier, policy: RetryPolicy) -> Self {
        Self {
            github,
            repo,
            policy,
        }
    }

    /// Fetches `check_id`, giving up once the retry policy is exhausted or `deadline` passes
    /// while waiting to retry. A request that is already in flight is never interrupted.
    pub async fn fetch(&self, check_id: u64, deadline: Instant) -> Result<CheckRun, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match self.github.check_run(&self.repo, check_id).await {
                Ok(check) => return Ok(check),
                Err(e) => e,
            };
            warn!(
                "Error fetching check {} (attempt {} of {}): {}",
                check_id, attempts, max_attempts, error
            );
            if attempts >= max_attempts {
                return Err(FetchError::Exhausted {
                    check_id,
                    attempts,
                    source: error,
                });
            }
            if Instant::now() >= deadline
                || timeout_at(deadline, sleep(self.policy.delay)).await.is_err()
            {
                return Err(FetchError::DeadlineElapsed {
                    check_id,
                    source: error,
                });
            }
        }
    }
}

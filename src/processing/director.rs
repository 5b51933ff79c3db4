use super::fetcher::{RetryPolicy, RetryingFetcher};
use super::lifecycle::{CheckLifecycleManager, TrackedCheck};
use super::output::extract_output;
use super::poller::{PollResult, PollingEngine};
use super::preflight::TargetPreflight;
use super::request::{CallerContext, DispatchRequest};
use super::Error;
use crate::github::{CheckRun, GithubClient};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct DirectorConfig {
    pub caller: CallerContext,
    pub server_url: String,
    pub request: DispatchRequest,

    /// How long to wait for the check to complete, `None` to not wait at all
    pub wait_timeout: Option<Duration>,

    pub poll_interval: Duration,
    pub retry_policy: RetryPolicy,

    /// Deadline for re-reading the check's report once it's completed
    pub scrape_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The workflow was dispatched and we didn't wait for it.
    Dispatched { check: CheckRun },

    /// The workflow completed successfully, `output` is whatever it embedded in its report.
    Completed { check: CheckRun, output: String },
}

/// Runs a single dispatch from start to end: validate, create the check, dispatch, wait and
/// collect the output.
pub struct Director {
    preflight: TargetPreflight,
    lifecycle: CheckLifecycleManager,
    poller: PollingEngine,
    scraper: RetryingFetcher,
    request: DispatchRequest,
    wait_timeout: Option<Duration>,
    scrape_timeout: Duration,
}

impl Director {
    pub fn new<G>(github: G, config: DirectorConfig) -> Self
    where
        G: GithubClient + 'static,
    {
        let github: Arc<dyn GithubClient> = Arc::new(github);
        let fetcher = RetryingFetcher::new(
            github.clone(),
            config.caller.repo.clone(),
            config.retry_policy,
        );
        Self {
            preflight: TargetPreflight::new(github.clone()),
            lifecycle: CheckLifecycleManager::new(github, config.caller, config.server_url),
            poller: PollingEngine::new(fetcher.clone(), config.poll_interval),
            scraper: fetcher,
            request: config.request,
            wait_timeout: config.wait_timeout,
            scrape_timeout: config.scrape_timeout,
        }
    }

    pub async fn run(&self) -> Result<RunOutcome, Error> {
        self.preflight.verify(&self.request.target).await?;
        let mut check = self.lifecycle.create(&self.request.target).await?;
        self.lifecycle.dispatch(&mut check, &self.request).await?;

        let timeout = match self.wait_timeout {
            Some(timeout) => timeout,
            None => {
                info!("wait_for_check was false, proceeding");
                return Ok(RunOutcome::Dispatched {
                    check: check.run().clone(),
                });
            }
        };
        self.wait(&mut check, timeout).await?;
        info!("Check completed successfully!");

        let output = self.scrape_output(check.id()).await?;
        Ok(RunOutcome::Completed {
            check: check.run().clone(),
            output,
        })
    }

    async fn wait(&self, check: &mut TrackedCheck, timeout: Duration) -> Result<(), Error> {
        let check_id = check.id();
        let deadline = Instant::now() + timeout;
        match self.poller.wait_until_complete(check_id, deadline).await? {
            PollResult::Success(run) => {
                check.complete(run);
                Ok(())
            }
            PollResult::Failure(run) => {
                let conclusion = run.conclusion;
                check.complete(run);
                Err(Error::CheckFailed {
                    check_id,
                    conclusion,
                })
            }
            PollResult::TimedOut => Err(Error::TimedOut { check_id, timeout }),
        }
    }

    /// Re-reads the completed check and pulls the output out of its report.
    async fn scrape_output(&self, check_id: u64) -> Result<String, Error> {
        let deadline = Instant::now() + self.scrape_timeout;
        let check = self.scraper.fetch(check_id, deadline).await?;
        let output = extract_output(check.report_text());
        if output.is_empty() {
            debug!("Check {} report has no output", check_id);
        }
        Ok(output.to_string())
    }
}

use super::request::{CallerContext, DispatchRequest, DispatchTarget};
use super::Error;
use crate::client;
use crate::github::{
    CheckRun, CheckRunConclusion, CheckRunOutput, CheckRunStatus, CreateCheckRunRequest,
    GithubClient, UpdateCheckRunRequest,
};
use chrono::Utc;
use log::info;
use std::sync::Arc;

static PENDING_SUMMARY: &str = "This report will be populated by the triggered workflow";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Created,
    Dispatched,
    Completed(CheckRunConclusion),
}

/// A check run created by us, along with where it is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedCheck {
    run: CheckRun,
    state: CheckState,
}

impl TrackedCheck {
    pub fn id(&self) -> u64 {
        self.run.id
    }

    pub fn run(&self) -> &CheckRun {
        &self.run
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    /// Records the final state of the check as reported by the remote workflow.
    pub fn complete(&mut self, run: CheckRun) {
        let conclusion = run.conclusion.unwrap_or(CheckRunConclusion::Unknown);
        self.run = run;
        self.state = CheckState::Completed(conclusion);
    }
}

/// Creates the check run that tracks a dispatched workflow and moves it through its states.
pub struct CheckLifecycleManager {
    github: Arc<dyn GithubClient>,
    caller: CallerContext,
    server_url: String,
}

impl CheckLifecycleManager {
    pub fn new<S: Into<String>>(
        github: Arc<dyn GithubClient>,
        caller: CallerContext,
        server_url: S,
    ) -> Self {
        Self {
            github,
            caller,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a queued check on the caller's commit.
    pub async fn create(&self, target: &DispatchTarget) -> Result<TrackedCheck, Error> {
        let details_url = format!(
            "{}/{}/{}/actions",
            self.server_url, target.repo.owner, target.repo.repo
        );
        let request = CreateCheckRunRequest {
            name: target.workflow.clone(),
            head_sha: self.caller.sha.clone(),
            details_url: Some(details_url),
            status: CheckRunStatus::Queued,
            started_at: Utc::now(),
            output: CheckRunOutput {
                title: Some(target.workflow.clone()),
                summary: Some(PENDING_SUMMARY.into()),
                text: None,
            },
        };
        let run = self
            .github
            .create_check_run(&self.caller.repo, &request)
            .await
            .map_err(Error::CheckCreation)?;
        if run.id == 0 {
            return Err(Error::as_generic("check creation did not return a check id"));
        }
        match &run.html_url {
            Some(url) => info!("Created check {} here: {}", run.id, url),
            None => info!("Created check {}", run.id),
        };
        Ok(TrackedCheck {
            run,
            state: CheckState::Created,
        })
    }

    /// Dispatches the target workflow, pointing it at `check`.
    ///
    /// If the dispatch fails the check is completed as a failure so it doesn't stay queued
    /// forever, and the dispatch error is returned.
    pub async fn dispatch(
        &self,
        check: &mut TrackedCheck,
        request: &DispatchRequest,
    ) -> Result<(), Error> {
        if check.state != CheckState::Created {
            return Err(Error::as_generic(format!(
                "check {} can't be dispatched in state {:?}",
                check.id(),
                check.state
            )));
        }
        let dispatch_error = match self.send_dispatch(check, request).await {
            Ok(()) => {
                check.state = CheckState::Dispatched;
                return Ok(());
            }
            Err(e) => e,
        };
        let mut reason = format!("Error dispatching workflow: {}", dispatch_error);
        if dispatch_error.unprocessable_entity() {
            reason.push_str(". Does the workflow have a `workflow_dispatch` trigger?");
        }
        match self.complete_as_failure(check, &reason).await {
            Ok(()) => Err(Error::Dispatch {
                check_id: check.id(),
                source: dispatch_error,
            }),
            Err(update_error) => Err(Error::Compensation {
                check_id: check.id(),
                dispatch: dispatch_error,
                update: update_error,
            }),
        }
    }

    /// Sends the dispatch request without touching the check.
    pub async fn send_dispatch(
        &self,
        check: &TrackedCheck,
        request: &DispatchRequest,
    ) -> Result<(), client::Error> {
        let target = &request.target;
        let body = request.to_dispatch_body(&self.caller, check.id());
        info!(
            "Dispatching to {} workflow in {}@{}",
            target.workflow_file(),
            target.repo,
            target.reference
        );
        if let Ok(inputs) = serde_json::to_string(&body.inputs) {
            info!("Complete workflow inputs: {}", inputs);
        }
        self.github
            .dispatch_workflow(&target.repo, &target.workflow_file(), &body)
            .await
    }

    /// Marks `check` as completed with a failure conclusion, using `reason` as its summary.
    pub async fn complete_as_failure(
        &self,
        check: &mut TrackedCheck,
        reason: &str,
    ) -> Result<(), client::Error> {
        let request = UpdateCheckRunRequest {
            name: check.run.name.clone(),
            status: CheckRunStatus::Completed,
            conclusion: Some(CheckRunConclusion::Failure),
            completed_at: Some(Utc::now()),
            output: CheckRunOutput {
                title: check.run.output.title.clone(),
                summary: Some(reason.into()),
                text: None,
            },
        };
        let run = self
            .github
            .update_check_run(&self.caller.repo, check.id(), &request)
            .await?;
        check.complete(run);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::MockGithubClient;
    use crate::github::RepoIdentifier;
    use mockall::predicate::{always, eq};
    use reqwest::StatusCode;
    use serde_json::Map;
    use std::sync::Mutex;

    fn make_caller() -> CallerContext {
        CallerContext {
            repo: RepoIdentifier::new("octo", "app"),
            sha: "abc123".into(),
        }
    }

    fn make_request() -> DispatchRequest {
        let target = DispatchTarget {
            repo: RepoIdentifier::new("octo", "infra"),
            workflow: "deploy".into(),
            extension: "yml".into(),
            reference: "main".into(),
        };
        DispatchRequest::new(target, Map::new()).unwrap()
    }

    fn run_from_create(request: &CreateCheckRunRequest) -> CheckRun {
        CheckRun {
            id: 42,
            name: request.name.clone(),
            status: request.status,
            conclusion: None,
            html_url: Some("https://github.com/octo/app/runs/42".into()),
            details_url: request.details_url.clone(),
            output: request.output.clone(),
        }
    }

    fn run_from_update(check_id: u64, request: &UpdateCheckRunRequest) -> CheckRun {
        CheckRun {
            id: check_id,
            name: request.name.clone(),
            status: request.status,
            conclusion: request.conclusion,
            html_url: None,
            details_url: None,
            output: request.output.clone(),
        }
    }

    fn github_creating_checks() -> MockGithubClient {
        let mut github = MockGithubClient::new();
        github
            .expect_create_check_run()
            .with(eq(RepoIdentifier::new("octo", "app")), always())
            .times(1)
            .returning(|_, request| Ok(run_from_create(request)));
        github
    }

    fn make_manager(github: MockGithubClient) -> CheckLifecycleManager {
        CheckLifecycleManager::new(Arc::new(github), make_caller(), "https://github.com/")
    }

    #[tokio::test]
    async fn create_queues_check_on_caller_commit() {
        let manager = make_manager(github_creating_checks());
        let check = manager.create(&make_request().target).await.unwrap();
        assert_eq!(check.id(), 42);
        assert_eq!(check.state(), CheckState::Created);
        assert_eq!(check.run().status, CheckRunStatus::Queued);
        assert_eq!(
            check.run().details_url.as_deref(),
            Some("https://github.com/octo/infra/actions")
        );
    }

    #[tokio::test]
    async fn create_failure_is_fatal() {
        let mut github = MockGithubClient::new();
        github
            .expect_create_check_run()
            .returning(|_, _| Err(client::Error::Http(StatusCode::FORBIDDEN)));
        let manager = make_manager(github);
        let error = manager.create(&make_request().target).await.unwrap_err();
        assert!(matches!(error, Error::CheckCreation(_)));
    }

    #[tokio::test]
    async fn successful_dispatch_points_workflow_at_check() {
        let mut github = github_creating_checks();
        github
            .expect_dispatch_workflow()
            .withf(|repo, file, body| {
                repo == &RepoIdentifier::new("octo", "infra")
                    && file == "deploy.yml"
                    && body.reference == "main"
                    && body.inputs["check_id"] == "42"
                    && body.inputs["github_repository"] == "octo/app"
                    && body.inputs["github_sha"] == "abc123"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        github.expect_update_check_run().times(0);
        let manager = make_manager(github);
        let request = make_request();
        let mut check = manager.create(&request.target).await.unwrap();
        manager.dispatch(&mut check, &request).await.unwrap();
        assert_eq!(check.state(), CheckState::Dispatched);
    }

    #[tokio::test]
    async fn failed_dispatch_completes_check_as_failure() {
        let mut github = github_creating_checks();
        github
            .expect_dispatch_workflow()
            .returning(|_, _, _| Err(client::Error::Http(StatusCode::UNPROCESSABLE_ENTITY)));
        let recorded = Arc::new(Mutex::new(None));
        let sink = recorded.clone();
        github
            .expect_update_check_run()
            .with(always(), eq(42u64), always())
            .times(1)
            .returning(move |_, check_id, request| {
                *sink.lock().unwrap() = Some(request.clone());
                Ok(run_from_update(check_id, request))
            });
        let manager = make_manager(github);
        let request = make_request();
        let mut check = manager.create(&request.target).await.unwrap();
        let error = manager.dispatch(&mut check, &request).await.unwrap_err();

        assert!(matches!(error, Error::Dispatch { check_id: 42, .. }));
        assert_eq!(
            check.state(),
            CheckState::Completed(CheckRunConclusion::Failure)
        );
        let update = recorded.lock().unwrap().clone().unwrap();
        assert_eq!(update.status, CheckRunStatus::Completed);
        assert_eq!(update.conclusion, Some(CheckRunConclusion::Failure));
        assert_eq!(update.output.title.as_deref(), Some("deploy"));
        let summary = update.output.summary.unwrap();
        assert!(summary.contains("422"), "{}", summary);
        assert!(summary.contains("workflow_dispatch"), "{}", summary);
    }

    #[tokio::test]
    async fn failed_compensation_reports_both_errors() {
        let mut github = github_creating_checks();
        github
            .expect_dispatch_workflow()
            .returning(|_, _, _| Err(client::Error::Http(StatusCode::NOT_FOUND)));
        github
            .expect_update_check_run()
            .returning(|_, _, _| Err(client::Error::Http(StatusCode::BAD_GATEWAY)));
        let manager = make_manager(github);
        let request = make_request();
        let mut check = manager.create(&request.target).await.unwrap();
        let error = manager.dispatch(&mut check, &request).await.unwrap_err();
        match error {
            Error::Compensation {
                check_id,
                dispatch,
                update,
            } => {
                assert_eq!(check_id, 42);
                assert!(dispatch.not_found());
                assert!(matches!(update, client::Error::Http(StatusCode::BAD_GATEWAY)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(check.state(), CheckState::Created);
    }

    #[tokio::test]
    async fn checks_are_dispatched_once() {
        let mut github = github_creating_checks();
        github
            .expect_dispatch_workflow()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let manager = make_manager(github);
        let request = make_request();
        let mut check = manager.create(&request.target).await.unwrap();
        manager.dispatch(&mut check, &request).await.unwrap();
        let error = manager.dispatch(&mut check, &request).await.unwrap_err();
        assert!(matches!(error, Error::Generic(_)));
    }
}

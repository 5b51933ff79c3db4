use super::models::{
    CheckRun, CreateCheckRunRequest, RepoIdentifier, Repository, UpdateCheckRunRequest,
    WorkflowDispatchRequest,
};
use crate::client::{ApiClient, Result};
use async_trait::async_trait;
use serde_json::Value;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GithubClient: Send + Sync {
    async fn create_check_run(
        &self,
        repo: &RepoIdentifier,
        request: &CreateCheckRunRequest,
    ) -> Result<CheckRun>;
    async fn check_run(&self, repo: &RepoIdentifier, check_id: u64) -> Result<CheckRun>;
    async fn update_check_run(
        &self,
        repo: &RepoIdentifier,
        check_id: u64,
        request: &UpdateCheckRunRequest,
    ) -> Result<CheckRun>;
    async fn repository(&self, repo: &RepoIdentifier) -> Result<Repository>;

    /// Returns whether `path` exists in `repo` at `reference`.
    async fn file_exists(&self, repo: &RepoIdentifier, path: &str, reference: &str)
        -> Result<bool>;
    async fn dispatch_workflow(
        &self,
        repo: &RepoIdentifier,
        workflow_file: &str,
        request: &WorkflowDispatchRequest,
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct DefaultGithubClient {
    client: ApiClient,
    api_url: String,
}

impl DefaultGithubClient {
    pub fn new<U: Into<String>>(client: ApiClient, api_url: U) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    fn make_repo_url(&self, repo: &RepoIdentifier) -> String {
        format!("{}/repos/{}/{}", self.api_url, repo.owner, repo.repo)
    }

    fn make_check_run_url(&self, repo: &RepoIdentifier, check_id: u64) -> String {
        format!("{}/check-runs/{}", self.make_repo_url(repo), check_id)
    }
}

#[async_trait]
impl GithubClient for DefaultGithubClient {
    async fn create_check_run(
        &self,
        repo: &RepoIdentifier,
        request: &CreateCheckRunRequest,
    ) -> Result<CheckRun> {
        let url = format!("{}/check-runs", self.make_repo_url(repo));
        self.client.post(&url, request).await
    }

    async fn check_run(&self, repo: &RepoIdentifier, check_id: u64) -> Result<CheckRun> {
        let url = self.make_check_run_url(repo, check_id);
        self.client.get(&url).await
    }

    async fn update_check_run(
        &self,
        repo: &RepoIdentifier,
        check_id: u64,
        request: &UpdateCheckRunRequest,
    ) -> Result<CheckRun> {
        let url = self.make_check_run_url(repo, check_id);
        self.client.patch(&url, request).await
    }

    async fn repository(&self, repo: &RepoIdentifier) -> Result<Repository> {
        let url = self.make_repo_url(repo);
        self.client.get(&url).await
    }

    async fn file_exists(
        &self,
        repo: &RepoIdentifier,
        path: &str,
        reference: &str,
    ) -> Result<bool> {
        let url = format!("{}/contents/{}", self.make_repo_url(repo), path);
        let contents: Result<Value> = self
            .client
            .get_with_query(&url, &[("ref", reference)])
            .await;
        match contents {
            Ok(_) => Ok(true),
            Err(e) if e.not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn dispatch_workflow(
        &self,
        repo: &RepoIdentifier,
        workflow_file: &str,
        request: &WorkflowDispatchRequest,
    ) -> Result<()> {
        let url = format!(
            "{}/actions/workflows/{}/dispatches",
            self.make_repo_url(repo),
            workflow_file
        );
        self.client.post(&url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn urls_are_built_from_the_api_base() {
        let api = ApiClient::new("token", Duration::from_secs(10)).unwrap();
        let github = DefaultGithubClient::new(api, "https://github.example.com/api/v3/");
        let repo = RepoIdentifier::new("octo", "app");
        assert_eq!(
            github.make_repo_url(&repo),
            "https://github.example.com/api/v3/repos/octo/app"
        );
        assert_eq!(
            github.make_check_run_url(&repo, 7),
            "https://github.example.com/api/v3/repos/octo/app/check-runs/7"
        );
    }
}

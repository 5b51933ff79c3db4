use super::request::DispatchTarget;
use super::Error;
use crate::github::GithubClient;
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;

/// Reasons a workflow can't be dispatched at the requested ref.
///
/// The dispatch API only knows about workflows that have been present on the default branch at
/// least once, so "doesn't exist" and "isn't registered yet" need different advice.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no {path} file was found at either ref. Perhaps you have a typo in the workflow filename?")]
    NotFound { path: String },

    #[error("please add a dummy {path} file to branch '{default_branch}' to 'register' the workflow with the GitHub API and try again!")]
    NotRegistered {
        path: String,
        default_branch: String,
    },

    #[error("the workflow {path} was found on {default_branch} but not {reference}!")]
    MissingAtRef {
        path: String,
        default_branch: String,
        reference: String,
    },
}

/// Where the workflow file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowPresence {
    pub on_default_branch: bool,
    pub on_target_ref: bool,
}

/// Decides whether a workflow can be dispatched given where its file was found.
pub fn classify(
    presence: WorkflowPresence,
    path: &str,
    default_branch: &str,
    reference: &str,
) -> Result<(), PreconditionError> {
    match (presence.on_default_branch, presence.on_target_ref) {
        (true, true) => Ok(()),
        (false, false) => Err(PreconditionError::NotFound { path: path.into() }),
        (false, true) => Err(PreconditionError::NotRegistered {
            path: path.into(),
            default_branch: default_branch.into(),
        }),
        (true, false) => Err(PreconditionError::MissingAtRef {
            path: path.into(),
            default_branch: default_branch.into(),
            reference: reference.into(),
        }),
    }
}

/// Verifies the target workflow can be dispatched before anything is created.
pub struct TargetPreflight {
    github: Arc<dyn GithubClient>,
}

impl TargetPreflight {
    pub fn new(github: Arc<dyn GithubClient>) -> Self {
        Self { github }
    }

    pub async fn verify(&self, target: &DispatchTarget) -> Result<(), Error> {
        let path = target.workflow_path();
        let repository = self.github.repository(&target.repo).await?;
        let default_branch = repository.default_branch;
        debug!("Default branch of {} is {}", target.repo, default_branch);

        let on_default_branch = self
            .github
            .file_exists(&target.repo, &path, &default_branch)
            .await?;
        let on_target_ref = if target.reference == default_branch {
            on_default_branch
        } else {
            self.github
                .file_exists(&target.repo, &path, &target.reference)
                .await?
        };
        if !(on_default_branch && on_target_ref) {
            warn!(
                "The target workflow must exist on both the default branch ({}) and target ref ({}) of {}",
                default_branch, target.reference, target.repo
            );
        }
        let presence = WorkflowPresence {
            on_default_branch,
            on_target_ref,
        };
        classify(presence, &path, &default_branch, &target.reference)?;
        info!(
            "Found {} on {} and {} in {}",
            path, default_branch, target.reference, target.repo
        );
        Ok(())
    }
}

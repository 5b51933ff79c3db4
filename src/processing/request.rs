use crate::github::{RepoIdentifier, WorkflowDispatchRequest};
use serde_json::{Map, Value};
use thiserror::Error;

/// Inputs added to every dispatch so the remote workflow can report back against our check.
pub const RESERVED_INPUTS: [&str; 3] = ["github_repository", "github_sha", "check_id"];

/// The repository and commit this tool runs on behalf of. Checks are created here.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerContext {
    pub repo: RepoIdentifier,
    pub sha: String,
}

/// The workflow to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTarget {
    pub repo: RepoIdentifier,

    /// Workflow file name, without extension
    pub workflow: String,

    /// Extension of the workflow file, `yml` or `yaml`
    pub extension: String,

    pub reference: String,
}

impl DispatchTarget {
    pub fn workflow_file(&self) -> String {
        format!("{}.{}", self.workflow, self.extension)
    }

    pub fn workflow_path(&self) -> String {
        format!(".github/workflows/{}", self.workflow_file())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub target: DispatchTarget,
    inputs: Map<String, Value>,
}

impl DispatchRequest {
    pub fn new(
        target: DispatchTarget,
        inputs: Map<String, Value>,
    ) -> Result<Self, ReservedInputError> {
        let mut collisions: Vec<_> = RESERVED_INPUTS
            .iter()
            .filter(|key| inputs.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        if !collisions.is_empty() {
            collisions.sort();
            return Err(ReservedInputError(collisions));
        }
        Ok(Self { target, inputs })
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    /// Builds the dispatch body, adding the reserved inputs that point back at `check_id`.
    pub fn to_dispatch_body(
        &self,
        caller: &CallerContext,
        check_id: u64,
    ) -> WorkflowDispatchRequest {
        let mut inputs = self.inputs.clone();
        inputs.insert("github_repository".into(), caller.repo.to_string().into());
        inputs.insert("github_sha".into(), caller.sha.clone().into());
        inputs.insert("check_id".into(), check_id.to_string().into());
        WorkflowDispatchRequest {
            reference: self.target.reference.clone(),
            inputs,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("workflow inputs use reserved keys: {}", .0.join(", "))]
pub struct ReservedInputError(pub Vec<String>);

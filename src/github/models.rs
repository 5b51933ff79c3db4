use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRunStatus {
    #[serde(rename = "queued")]
    Queued,

    #[serde(rename = "in_progress")]
    InProgress,

    #[serde(rename = "completed")]
    Completed,

    #[serde(other, rename = "unknown")]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRunConclusion {
    #[serde(rename = "success")]
    Success,

    #[serde(rename = "failure")]
    Failure,

    #[serde(rename = "neutral")]
    Neutral,

    #[serde(rename = "cancelled")]
    Cancelled,

    #[serde(rename = "skipped")]
    Skipped,

    #[serde(rename = "timed_out")]
    TimedOut,

    #[serde(rename = "action_required")]
    ActionRequired,

    #[serde(rename = "stale")]
    Stale,

    #[serde(other, rename = "unknown")]
    Unknown,
}

impl fmt::Display for CheckRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for CheckRunConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Neutral => "neutral",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Stale => "stale",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CheckRunOutput {
    pub title: Option<String>,
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    pub status: CheckRunStatus,
    pub conclusion: Option<CheckRunConclusion>,
    pub html_url: Option<String>,
    pub details_url: Option<String>,

    #[serde(default)]
    pub output: CheckRunOutput,
}

impl CheckRun {
    pub fn is_completed(&self) -> bool {
        self.status == CheckRunStatus::Completed
    }

    pub fn succeeded(&self) -> bool {
        self.is_completed() && self.conclusion == Some(CheckRunConclusion::Success)
    }

    /// The free form report body, empty if the check has none yet.
    pub fn report_text(&self) -> &str {
        self.output.text.as_deref().unwrap_or_default()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreateCheckRunRequest {
    pub name: String,
    pub head_sha: String,
    pub details_url: Option<String>,
    pub status: CheckRunStatus,
    pub started_at: DateTime<Utc>,
    pub output: CheckRunOutput,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UpdateCheckRunRequest {
    pub name: String,
    pub status: CheckRunStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<CheckRunConclusion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub output: CheckRunOutput,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WorkflowDispatchRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub inputs: Map<String, Value>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Repository {
    pub name: String,
    pub default_branch: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Installation {
    pub id: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An `owner/repo` pair.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RepoIdentifier {
    pub owner: String,
    pub repo: String,
}

impl RepoIdentifier {
    pub fn new<O, R>(owner: O, repo: R) -> Self
    where
        O: Into<String>,
        R: Into<String>,
    {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoIdentifier {
    type Err = MalformedRepoNameError;

    fn from_str(s: &str) -> Result<Self, MalformedRepoNameError> {
        let mut chunks = s.split('/');
        let (owner, repo) = match (chunks.next(), chunks.next()) {
            (Some(owner), Some(repo)) => (owner, repo),
            _ => return Err(MalformedRepoNameError("too few slashes")),
        };
        if chunks.next().is_some() {
            return Err(MalformedRepoNameError("too many slashes"));
        }
        if owner.is_empty() || repo.is_empty() {
            return Err(MalformedRepoNameError("empty owner/repo name"));
        }
        Ok(Self::new(owner, repo))
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
#[error("malformed repo name: {0}")]
pub struct MalformedRepoNameError(&'static str);

use super::fetcher::FetchError;
use super::preflight::PreconditionError;
use crate::github::CheckRunConclusion;
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] crate::client::Error),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("error creating check: {0}")]
    CheckCreation(#[source] crate::client::Error),

    #[error("error dispatching workflow: {source}")]
    Dispatch {
        check_id: u64,
        source: crate::client::Error,
    },

    #[error(
        "error dispatching workflow: {dispatch}; marking check {check_id} as failed also failed: {update}"
    )]
    Compensation {
        check_id: u64,
        dispatch: crate::client::Error,
        update: crate::client::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("timed out after {}s waiting for check {check_id} to complete", .timeout.as_secs())]
    TimedOut { check_id: u64, timeout: Duration },

    #[error("check {check_id} completed with conclusion '{}'", display_conclusion(.conclusion))]
    CheckFailed {
        check_id: u64,
        conclusion: Option<CheckRunConclusion>,
    },

    #[error("{0}")]
    Generic(Cow<'static, str>),
}

impl Error {
    pub fn as_generic<T>(message: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        Self::Generic(message.into())
    }
}

fn display_conclusion(conclusion: &Option<CheckRunConclusion>) -> String {
    match conclusion {
        Some(conclusion) => conclusion.to_string(),
        None => "none".into(),
    }
}

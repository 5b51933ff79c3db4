use crate::github::{AppAuth, MalformedRepoNameError};
use crate::processing::{
    CallerContext, DirectorConfig, DispatchRequest, DispatchTarget, ReservedInputError,
    RetryPolicy,
};
use config::{Config, ConfigError, Environment, File};
use jsonwebtoken::EncodingKey;
use regex::Regex;
use serde_derive::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

static WORKFLOW_FILENAME_PATTERN: &str =
    r"^(?P<name>[A-Za-z0-9_.-]+?)(?:\.(?P<extension>ya?ml))?$";
static DEFAULT_WORKFLOW_EXTENSION: &str = "yml";

/// Inputs of the action, read from `INPUT_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ActionInputs {
    pub app_id: u64,
    pub private_key: String,

    #[serde(default)]
    pub installation_id: Option<u64>,

    pub target_repository: String,
    pub target_ref: String,
    pub workflow_filename: String,

    #[serde(default = "default_wait_for_check")]
    pub wait_for_check: bool,

    #[serde(default = "default_wait_timeout_seconds")]
    pub wait_timeout_seconds: u64,

    #[serde(default = "default_workflow_inputs")]
    pub workflow_inputs: String,

    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    #[serde(default = "default_fetch_max_attempts")]
    pub fetch_max_attempts: u32,

    #[serde(default = "default_fetch_retry_delay_seconds")]
    pub fetch_retry_delay_seconds: u64,

    #[serde(default = "default_api_timeout_seconds")]
    pub api_timeout_seconds: u64,
}

/// Variables set by the actions runner, read from `GITHUB_*` environment variables.
#[derive(Deserialize, Debug, Clone)]
pub struct RunnerContext {
    pub repository: String,
    pub sha: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_server_url")]
    pub server_url: String,
}

fn default_wait_for_check() -> bool {
    true
}

fn default_wait_timeout_seconds() -> u64 {
    600
}

fn default_workflow_inputs() -> String {
    "{}".into()
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_fetch_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_fetch_retry_delay_seconds() -> u64 {
    RetryPolicy::default().delay.as_secs()
}

fn default_api_timeout_seconds() -> u64 {
    10
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}

fn default_server_url() -> String {
    "https://github.com".into()
}

pub struct DispatchbroConfig {
    pub inputs: ActionInputs,
    pub runner: RunnerContext,
}

impl DispatchbroConfig {
    /// Loads the inputs from an optional settings file, overridden by the environment.
    pub fn new(config_file_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut inputs = Config::new();
        if let Some(path) = config_file_path {
            let path = shellexpand::tilde(path);
            inputs.merge(File::with_name(&path).required(false))?;
        }
        inputs.merge(Environment::with_prefix("input"))?;

        let mut runner = Config::new();
        runner.merge(Environment::with_prefix("github"))?;
        Ok(Self {
            inputs: inputs.try_into()?,
            runner: runner.try_into()?,
        })
    }

    /// Checks every input and turns them into what a run needs, before any request is made.
    pub fn validate(self) -> Result<RunConfig, Error> {
        let inputs = self.inputs;
        let runner = self.runner;

        let caller = CallerContext {
            repo: runner
                .repository
                .parse()
                .map_err(Error::CallerRepository)?,
            sha: non_empty("GITHUB_SHA", runner.sha)?,
        };
        let (workflow, extension) = parse_workflow_filename(&inputs.workflow_filename)?;
        let target = DispatchTarget {
            repo: inputs
                .target_repository
                .parse()
                .map_err(Error::TargetRepository)?,
            workflow,
            extension,
            reference: non_empty("target_ref", inputs.target_ref)?,
        };
        let workflow_inputs = match serde_json::from_str(&inputs.workflow_inputs) {
            Ok(Value::Object(workflow_inputs)) => workflow_inputs,
            Ok(_) => return Err(Error::WorkflowInputsNotObject),
            Err(e) => return Err(Error::WorkflowInputsJson(e)),
        };
        let request = DispatchRequest::new(target, workflow_inputs)?;

        if inputs.fetch_max_attempts == 0 {
            return Err(Error::FetchAttempts);
        }
        let key = EncodingKey::from_rsa_pem(inputs.private_key.as_bytes())
            .map_err(Error::PrivateKey)?;

        let wait_timeout = if inputs.wait_for_check {
            Some(Duration::from_secs(inputs.wait_timeout_seconds))
        } else {
            None
        };
        let api_timeout = Duration::from_secs(inputs.api_timeout_seconds);
        let director = DirectorConfig {
            caller,
            server_url: runner.server_url,
            request,
            wait_timeout,
            poll_interval: Duration::from_secs(inputs.poll_interval_seconds),
            retry_policy: RetryPolicy {
                max_attempts: inputs.fetch_max_attempts,
                delay: Duration::from_secs(inputs.fetch_retry_delay_seconds),
            },
            scrape_timeout: api_timeout,
        };
        Ok(RunConfig {
            auth: AppAuth::new(inputs.app_id, key),
            installation_id: inputs.installation_id,
            api_url: runner.api_url,
            api_timeout,
            director,
        })
    }
}

/// Everything needed for a run, validated.
pub struct RunConfig {
    pub auth: AppAuth,
    pub installation_id: Option<u64>,
    pub api_url: String,
    pub api_timeout: Duration,
    pub director: DirectorConfig,
}

/// Splits a workflow file name into its name and extension, `yml` unless `.yaml` was given.
fn parse_workflow_filename(filename: &str) -> Result<(String, String), Error> {
    let pattern = Regex::new(WORKFLOW_FILENAME_PATTERN)?;
    let captures = pattern
        .captures(filename)
        .ok_or_else(|| Error::WorkflowFilename(filename.into()))?;
    let name = match captures.name("name") {
        Some(name) => name.as_str().to_string(),
        None => return Err(Error::WorkflowFilename(filename.into())),
    };
    let extension = captures
        .name("extension")
        .map_or(DEFAULT_WORKFLOW_EXTENSION, |extension| extension.as_str());
    Ok((name, extension.to_string()))
}

fn non_empty(name: &'static str, value: String) -> Result<String, Error> {
    if value.trim().is_empty() {
        Err(Error::Empty(name))
    } else {
        Ok(value)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("input 'target_repository' not formatted as owner/repo-name: {0}")]
    TargetRepository(#[source] MalformedRepoNameError),

    #[error("GITHUB_REPOSITORY not formatted as owner/repo-name: {0}")]
    CallerRepository(#[source] MalformedRepoNameError),

    #[error("input 'workflow_filename' is not a valid workflow file name: '{0}'")]
    WorkflowFilename(String),

    #[error("input 'workflow_inputs' is not json: {0}")]
    WorkflowInputsJson(#[source] serde_json::Error),

    #[error("input 'workflow_inputs' must be a json object")]
    WorkflowInputsNotObject,

    #[error(transparent)]
    ReservedInputs(#[from] ReservedInputError),

    #[error("input 'private_key' is not a valid RSA private key: {0}")]
    PrivateKey(#[source] jsonwebtoken::errors::Error),

    #[error("input 'fetch_max_attempts' must be at least 1")]
    FetchAttempts,

    #[error("'{0}' must not be empty")]
    Empty(&'static str),

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepoIdentifier;
    use rstest::rstest;

    const PRIVATE_KEY: &str = include_str!("../testdata/app-key.pem");

    fn make_inputs() -> ActionInputs {
        ActionInputs {
            app_id: 1234,
            private_key: PRIVATE_KEY.into(),
            installation_id: None,
            target_repository: "octo/infra".into(),
            target_ref: "main".into(),
            workflow_filename: "deploy".into(),
            wait_for_check: default_wait_for_check(),
            wait_timeout_seconds: default_wait_timeout_seconds(),
            workflow_inputs: r#"{"environment": "staging"}"#.into(),
            poll_interval_seconds: default_poll_interval_seconds(),
            fetch_max_attempts: default_fetch_max_attempts(),
            fetch_retry_delay_seconds: default_fetch_retry_delay_seconds(),
            api_timeout_seconds: default_api_timeout_seconds(),
        }
    }

    fn make_config(inputs: ActionInputs) -> DispatchbroConfig {
        DispatchbroConfig {
            inputs,
            runner: RunnerContext {
                repository: "octo/app".into(),
                sha: "abc123".into(),
                api_url: default_api_url(),
                server_url: default_server_url(),
            },
        }
    }

    #[rstest]
    #[case("deploy", "deploy", "yml")]
    #[case("deploy.yml", "deploy", "yml")]
    #[case("deploy.yaml", "deploy", "yaml")]
    #[case("release.prod.yml", "release.prod", "yml")]
    #[case("build_and-test", "build_and-test", "yml")]
    fn valid_workflow_filenames(
        #[case] filename: &str,
        #[case] name: &str,
        #[case] extension: &str,
    ) {
        let (parsed_name, parsed_extension) = parse_workflow_filename(filename).unwrap();
        assert_eq!(parsed_name, name);
        assert_eq!(parsed_extension, extension);
    }

    #[rstest]
    #[case("")]
    #[case(".github/workflows/deploy.yml")]
    #[case("deploy workflow")]
    fn invalid_workflow_filenames(#[case] filename: &str) {
        assert!(matches!(
            parse_workflow_filename(filename),
            Err(Error::WorkflowFilename(_))
        ));
    }

    #[test]
    fn valid_inputs() {
        let config = make_config(make_inputs()).validate().unwrap();
        let director = config.director;
        assert_eq!(director.caller.repo, RepoIdentifier::new("octo", "app"));
        assert_eq!(director.request.target.repo.to_string(), "octo/infra");
        assert_eq!(director.request.target.workflow, "deploy");
        assert_eq!(director.request.inputs()["environment"], "staging");
        assert_eq!(director.wait_timeout, Some(Duration::from_secs(600)));
        assert_eq!(director.retry_policy, RetryPolicy::default());
        assert_eq!(director.poll_interval, Duration::from_secs(5));
        assert_eq!(config.api_timeout, Duration::from_secs(10));
        assert_eq!(config.auth.app_id, 1234);
    }

    #[test]
    fn yaml_extension_is_kept() {
        let mut inputs = make_inputs();
        inputs.workflow_filename = "deploy.yaml".into();
        let config = make_config(inputs).validate().unwrap();
        let target = config.director.request.target;
        assert_eq!(target.workflow, "deploy");
        assert_eq!(target.workflow_file(), "deploy.yaml");
        assert_eq!(target.workflow_path(), ".github/workflows/deploy.yaml");
    }

    #[test]
    fn missing_extension_defaults_to_yml() {
        let config = make_config(make_inputs()).validate().unwrap();
        assert_eq!(config.director.request.target.workflow_file(), "deploy.yml");
    }

    #[test]
    fn not_waiting_has_no_timeout() {
        let mut inputs = make_inputs();
        inputs.wait_for_check = false;
        let config = make_config(inputs).validate().unwrap();
        assert_eq!(config.director.wait_timeout, None);
    }

    #[rstest]
    #[case(r#"["a"]"#)]
    #[case("42")]
    fn workflow_inputs_must_be_an_object(#[case] workflow_inputs: &str) {
        let mut inputs = make_inputs();
        inputs.workflow_inputs = workflow_inputs.into();
        assert!(matches!(
            make_config(inputs).validate(),
            Err(Error::WorkflowInputsNotObject)
        ));
    }

    #[test]
    fn workflow_inputs_must_be_json() {
        let mut inputs = make_inputs();
        inputs.workflow_inputs = "environment=prod".into();
        assert!(matches!(
            make_config(inputs).validate(),
            Err(Error::WorkflowInputsJson(_))
        ));
    }

    #[test]
    fn reserved_workflow_inputs_are_rejected() {
        let mut inputs = make_inputs();
        inputs.workflow_inputs = r#"{"check_id": "1"}"#.into();
        assert!(matches!(
            make_config(inputs).validate(),
            Err(Error::ReservedInputs(_))
        ));
    }

    #[rstest]
    #[case("octo")]
    #[case("octo/infra/extra")]
    #[case("/infra")]
    fn malformed_target_repository(#[case] repository: &str) {
        let mut inputs = make_inputs();
        inputs.target_repository = repository.into();
        assert!(matches!(
            make_config(inputs).validate(),
            Err(Error::TargetRepository(_))
        ));
    }

    #[test]
    fn malformed_private_key() {
        let mut inputs = make_inputs();
        inputs.private_key = "not a key".into();
        assert!(matches!(
            make_config(inputs).validate(),
            Err(Error::PrivateKey(_))
        ));
    }

    #[test]
    fn zero_fetch_attempts() {
        let mut inputs = make_inputs();
        inputs.fetch_max_attempts = 0;
        assert!(matches!(
            make_config(inputs).validate(),
            Err(Error::FetchAttempts)
        ));
    }

    #[test]
    fn empty_target_ref() {
        let mut inputs = make_inputs();
        inputs.target_ref = " ".into();
        assert!(matches!(
            make_config(inputs).validate(),
            Err(Error::Empty("target_ref"))
        ));
    }
}

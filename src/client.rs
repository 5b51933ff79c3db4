use backoff::{backoff::Backoff, ExponentialBackoff};
use log::{debug, info};
use reqwest::{header, Client, ClientBuilder, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

static USER_AGENT: &str = "dispatchbro";
static ACCEPT: &str = "application/vnd.github+json";
static API_VERSION: &str = "2022-11-28";

pub type Result<T> = std::result::Result<T, Error>;

/// Thin JSON client over `reqwest` that authenticates every request with a bearer token.
///
/// Every call is bounded by the timeout given at construction time.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    token: String,
}

impl ApiClient {
    pub fn new<T: Into<String>>(token: T, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }

    pub async fn get<O>(&self, endpoint: &str) -> Result<O>
    where
        O: DeserializeOwned + Debug,
    {
        self.get_with_query(endpoint, &[]).await
    }

    pub async fn get_with_query<O>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<O>
    where
        O: DeserializeOwned + Debug,
    {
        retry_request_if_needed(|| {
            let builder = self.client.get(endpoint).query(query);
            self.submit(builder)
        })
        .await
    }

    pub async fn post<I, O>(&self, endpoint: &str, body: &I) -> Result<O>
    where
        I: Serialize,
        O: DeserializeOwned + Debug,
    {
        retry_request_if_needed(|| {
            let builder = self.client.post(endpoint).json(body);
            self.submit(builder)
        })
        .await
    }

    pub async fn patch<I, O>(&self, endpoint: &str, body: &I) -> Result<O>
    where
        I: Serialize,
        O: DeserializeOwned + Debug,
    {
        retry_request_if_needed(|| {
            let builder = self.client.patch(endpoint).json(body);
            self.submit(builder)
        })
        .await
    }

    async fn submit<O>(&self, builder: RequestBuilder) -> Result<O>
    where
        O: DeserializeOwned,
    {
        let builder = builder
            .bearer_auth(&self.token)
            .header(header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION);
        let response = builder.send().await?;
        let status = response.status();
        debug!("{} {}", status, response.url());
        if status == StatusCode::NO_CONTENT {
            // Endpoints like workflow dispatches answer with an empty body
            Ok(serde_json::from_value(serde_json::Value::Null)?)
        } else if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Error::Http(status))
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("rate limited max attempts reached")]
    RateLimitRetries,

    #[error("request failed with status code {0}")]
    Http(StatusCode),

    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    pub fn not_found(&self) -> bool {
        matches!(self, Self::Http(StatusCode::NOT_FOUND))
    }

    pub fn unprocessable_entity(&self) -> bool {
        matches!(self, Self::Http(StatusCode::UNPROCESSABLE_ENTITY))
    }

    pub fn too_many_requests(&self) -> bool {
        matches!(self, Self::Http(StatusCode::TOO_MANY_REQUESTS))
    }
}

async fn retry_request_if_needed<F, R, O>(requestor: F) -> Result<O>
where
    F: Fn() -> R,
    R: Future<Output = Result<O>>,
    O: DeserializeOwned + Debug,
{
    let mut backoff = ExponentialBackoff::default();
    loop {
        match requestor().await {
            Err(e) if e.too_many_requests() => {
                let delay = backoff.next_backoff();
                match delay {
                    Some(delay) => {
                        info!("Rate limit hit, sleeping for {}s", delay.as_secs());
                        sleep(delay).await
                    }
                    None => return Err(Error::RateLimitRetries),
                }
            }
            other => return other,
        }
    }
}

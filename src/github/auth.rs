use super::client::DefaultGithubClient;
use super::models::{Installation, InstallationToken};
use crate::client::{self, ApiClient};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info};
use serde_derive::Serialize;
use std::time::{Duration, SystemTime};
use thiserror::Error;

const INSTALLATIONS_PAGE_SIZE: usize = 100;

/// Credentials of a GitHub App, used to mint installation tokens.
pub struct AppAuth {
    pub app_id: u64,
    pub key: EncodingKey,
}

#[derive(Serialize)]
struct Claims {
    iss: u64,
    iat: u64,
    exp: u64,
}

impl AppAuth {
    pub fn new(app_id: u64, key: EncodingKey) -> Self {
        Self { app_id, key }
    }

    fn generate_bearer_token(&self) -> Result<String, Error> {
        let now = SystemTime::UNIX_EPOCH
            .elapsed()
            .map_err(|_| Error::Clock)?
            .as_secs();
        // Backdated to tolerate clock drift against the API
        let claims = Claims {
            iss: self.app_id,
            iat: now.saturating_sub(60),
            exp: now + 9 * 60,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }
}

pub struct AppClient {
    client: ApiClient,
    api_url: String,
}

impl AppClient {
    pub fn new<U: Into<String>>(
        auth: &AppAuth,
        api_url: U,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let client = ApiClient::new(auth.generate_bearer_token()?, timeout)?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn installations(&self) -> Result<Vec<Installation>, Error> {
        let url = format!("{}/app/installations", self.api_url);
        let per_page = INSTALLATIONS_PAGE_SIZE.to_string();
        let mut all_installations = Vec::new();
        let mut page = 1;
        loop {
            let page_number = page.to_string();
            let query = [("per_page", per_page.as_str()), ("page", page_number.as_str())];
            let installations: Vec<Installation> =
                self.client.get_with_query(&url, &query).await?;
            let last_page = installations.len() < INSTALLATIONS_PAGE_SIZE;
            all_installations.extend(installations);
            if last_page {
                break;
            }
            page += 1;
        }
        debug!("App has {} installations", all_installations.len());
        Ok(all_installations)
    }

    /// Picks the installation with the given id, or the first one if no id is given.
    pub async fn select_installation(
        &self,
        installation_id: Option<u64>,
    ) -> Result<u64, Error> {
        let installations = self.installations().await?;
        select_installation(&installations, installation_id)
    }

    pub async fn installation_token(
        &self,
        installation_id: u64,
    ) -> Result<InstallationToken, Error> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );
        let token: InstallationToken = self.client.post(&url, &()).await?;
        info!("Authenticated as app installation {}", installation_id);
        Ok(token)
    }
}

/// Authenticates as an installation of the app and returns a client acting on its behalf.
pub async fn installation_client(
    auth: &AppAuth,
    installation_id: Option<u64>,
    api_url: &str,
    timeout: Duration,
) -> Result<DefaultGithubClient, Error> {
    let app = AppClient::new(auth, api_url, timeout)?;
    let installation_id = app.select_installation(installation_id).await?;
    let token = app.installation_token(installation_id).await?;
    if let Some(expires_at) = token.expires_at {
        debug!("Installation token expires at {}", expires_at);
    }
    let client = ApiClient::new(token.token, timeout)?;
    Ok(DefaultGithubClient::new(client, api_url))
}

fn select_installation(
    installations: &[Installation],
    installation_id: Option<u64>,
) -> Result<u64, Error> {
    match installation_id {
        // Apps installed in a single place don't need to be told which installation to use
        None => installations
            .first()
            .map(|installation| installation.id)
            .ok_or(Error::NoInstallations),
        Some(id) => installations
            .iter()
            .find(|installation| installation.id == id)
            .map(|installation| installation.id)
            .ok_or(Error::UnknownInstallation(id)),
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("system clock is before the unix epoch")]
    Clock,

    #[error("failed to sign app token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("the app has no installations")]
    NoInstallations,

    #[error("no installation with id {0} found")]
    UnknownInstallation(u64),

    #[error("failed to fetch app installations: {0}")]
    Client(#[from] client::Error),
}

pub mod auth;
pub mod client;
pub mod models;

pub use auth::{installation_client, AppAuth, AppClient};
pub use client::{DefaultGithubClient, GithubClient};
pub use models::*;

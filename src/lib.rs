pub mod actions;
pub mod client;
pub mod config;
pub mod github;
pub mod processing;

pub use crate::config::{DispatchbroConfig, RunConfig};
pub use processing::{Director, DirectorConfig, RunOutcome};

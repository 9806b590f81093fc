use std::io;

use catchup_core::api::ApiError;
use catchup_core::auth::{AuthError, RefreshError};
use catchup_core::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] catchup_core::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Nothing to update: pass --name, --feed-url, --resume or --pause")]
    EmptyUpdate,
    #[error("Not signed in. Run `catchup auth login --profile {0} --email <email>`.")]
    NotSignedIn(String),
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

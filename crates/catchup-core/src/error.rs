//! Error types for catchup-core

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::{AuthError, RefreshError};
use crate::config::ConfigError;

/// Result type alias using catchup-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in catchup-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Authenticated request pipeline failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Token store or session failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Token refresh failure
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Invalid client configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

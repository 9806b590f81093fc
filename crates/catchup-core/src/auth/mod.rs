//! Session token lifecycle: storage, introspection, sync and refresh.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiError;

pub mod jwt;
pub mod persistence;
pub mod refresh;
pub mod session;
pub mod store;
pub mod sync;

pub use persistence::{MemoryPersistence, TokenPersistence};
pub use refresh::{RefreshCoordinator, RefreshError, TokenRefresher};
pub use session::AuthService;
pub use store::{TokenRecord, TokenStore};
pub use sync::{BroadcastNotifier, NoopNotifier, PeerNotifier, TokenSyncEnvelope, TokenSyncMessage};

/// Backend path for password login.
pub const LOGIN_ENDPOINT: &str = "/auth/token";
/// Backend path for exchanging a refresh token.
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";

#[derive(Debug, Error)]
pub enum AuthError {
    /// The in-memory token map could not be written.
    #[error("Token storage error: {0}")]
    Storage(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
    #[error("{0}")]
    InvalidCredentials(&'static str),
    #[error("Auth API error: {0}")]
    Api(#[from] ApiError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Tokens returned by login and refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Write both tokens into `store`. A missing refresh token leaves the
    /// stored one in place.
    pub fn store_into(self, store: &TokenStore) -> AuthResult<()> {
        store.set_access_token(self.token)?;
        if let Some(refresh_token) = self.refresh_token {
            store.set_refresh_token(refresh_token)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenPair")
            .field("token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

pub(crate) fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::InvalidCredentials("Email is required"));
    }
    if password.trim().is_empty() {
        return Err(AuthError::InvalidCredentials("Password is required"));
    }
    Ok(())
}

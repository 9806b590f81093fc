//! Login, logout and session restore.

use std::sync::Arc;

use serde_json::json;

use super::{
    validate_credentials, AuthResult, RefreshCoordinator, RefreshError, TokenPair, TokenStore,
    LOGIN_ENDPOINT,
};
use crate::api::{ApiClient, RequestOptions};

#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    refresher: RefreshCoordinator,
}

impl AuthService {
    pub const fn new(api: ApiClient, refresher: RefreshCoordinator) -> Self {
        Self { api, refresher }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.api.tokens()
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<()> {
        validate_credentials(email, password)?;

        let options = RequestOptions::post(json!({
            "email": email.trim(),
            "password": password,
        }))
        .without_auth();
        let pair: TokenPair = self.api.request(LOGIN_ENDPOINT, options).await?;
        pair.store_into(self.tokens())?;

        tracing::info!("Signed in as {}", email.trim());
        Ok(())
    }

    pub fn logout(&self) {
        self.tokens().clear_all();
        tracing::info!("Signed out");
    }

    /// A present, unexpired access token. Tokens without `exp` count.
    pub fn is_authenticated(&self) -> bool {
        let tokens = self.tokens();
        !tokens.is_expired(&tokens.keys().access)
    }

    /// Make the stored session usable, refreshing a missing or expired
    /// access token when a refresh token is available.
    ///
    /// Returns `Ok(false)` when there is nothing to restore.
    pub async fn restore_session(&self) -> Result<bool, RefreshError> {
        let tokens = self.tokens();
        if !tokens.is_expired(&tokens.keys().access) {
            return Ok(true);
        }
        if tokens.refresh_token().is_none() {
            return Ok(false);
        }

        self.refresher.refresh().await?;
        Ok(self.is_authenticated())
    }
}

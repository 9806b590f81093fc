//! De-duplicated access token refresh.
//!
//! Concurrent callers share one in-flight exchange. The shared slot is cleared
//! when that exchange settles, so the next expiry starts a fresh attempt.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use thiserror::Error;

use super::{TokenPair, TokenStore, REFRESH_ENDPOINT};
use crate::api::retry::backoff_delay;
use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::config::{RetryPolicy, TokenRefreshConfig};
use crate::util::unix_timestamp_now;

#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("No refresh token available")]
    MissingRefreshToken,
    #[error("Access token expired {expired_for}s ago, beyond the {grace_period}s grace period")]
    GracePeriodExceeded { expired_for: i64, grace_period: i64 },
    #[error("Token refresh failed after {attempts} attempt(s): {source}")]
    Exhausted { attempts: u32, source: ApiError },
    #[error("Failed to store refreshed token: {0}")]
    Store(String),
}

/// Something that can obtain a fresh access token for the pipeline.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), RefreshError>;
}

type PendingRefresh = Shared<BoxFuture<'static, Result<(), RefreshError>>>;

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<RefreshInner>,
}

struct RefreshInner {
    api: ApiClient,
    config: TokenRefreshConfig,
    pending: Mutex<Option<PendingRefresh>>,
}

impl RefreshCoordinator {
    /// `api` must be a client without a refresher of its own; the exchange
    /// call is unauthenticated.
    pub fn new(api: ApiClient, config: TokenRefreshConfig) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                api,
                config,
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Refresh the access token, joining an in-flight refresh if one exists.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let pending = {
            let mut slot = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = slot.as_ref() {
                tracing::debug!("Joining in-flight token refresh");
                pending.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let pending = async move {
                    let outcome = inner.refresh_with_retries().await;
                    inner
                        .pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    outcome
                }
                .boxed()
                .shared();
                *slot = Some(pending.clone());
                pending
            }
        };

        pending.await
    }
}

#[async_trait]
impl TokenRefresher for RefreshCoordinator {
    async fn refresh(&self) -> Result<(), RefreshError> {
        Self::refresh(self).await
    }
}

impl RefreshInner {
    async fn refresh_with_retries(&self) -> Result<(), RefreshError> {
        let tokens = self.api.tokens();
        let refresh_token = tokens
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;
        if let Err(error) = check_grace_period(tokens, self.config.grace_period_secs) {
            tracing::warn!("Session expired beyond grace period, clearing tokens: {}", error);
            tokens.clear_all();
            return Err(error);
        }

        let backoff = RetryPolicy {
            max_retries: self.config.retry_attempts,
            initial_delay: self.config.initial_delay,
            max_delay: Duration::MAX,
            backoff_multiplier: 2.0,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.exchange(&refresh_token).await {
                Ok(pair) => {
                    pair.store_into(tokens)
                        .map_err(|error| RefreshError::Store(error.to_string()))?;
                    tracing::info!("Access token refreshed");
                    return Ok(());
                }
                Err(error) if error.is_retryable() && attempt <= backoff.max_retries => {
                    let delay = backoff_delay(&backoff, attempt - 1);
                    tracing::debug!(
                        "Token refresh attempt {} failed ({}), retrying in {}ms",
                        attempt,
                        error,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return Err(RefreshError::Exhausted {
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let options = RequestOptions::post(json!({ "refresh_token": refresh_token }))
            .without_auth()
            .no_retry();
        self.api.request(REFRESH_ENDPOINT, options).await
    }
}

/// Fail fast when the access token expired longer ago than `grace_period_secs`.
///
/// Reads the last known expiry, so an access token already dropped for
/// expiring is still judged. A token with no expiry metadata passes.
fn check_grace_period(tokens: &TokenStore, grace_period_secs: i64) -> Result<(), RefreshError> {
    let Some(expires_at) = tokens.access_token_last_known_expiry() else {
        return Ok(());
    };
    let expired_for = unix_timestamp_now() - expires_at;
    if expired_for > grace_period_secs {
        return Err(RefreshError::GracePeriodExceeded {
            expired_for,
            grace_period: grace_period_secs,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoopNavigator;
    use crate::auth::jwt::test_tokens::jwt_expiring_in;
    use crate::config::{ClientConfig, TokenKeys};

    fn coordinator() -> (RefreshCoordinator, Arc<TokenStore>) {
        // Port 9 (discard) on loopback: any call that slips through fails fast.
        let config = ClientConfig::with_base_url("http://127.0.0.1:9").unwrap();
        let tokens = Arc::new(TokenStore::in_memory(TokenKeys::default()));
        let api = ApiClient::new(&config, Arc::clone(&tokens), Arc::new(NoopNavigator)).unwrap();
        (RefreshCoordinator::new(api, config.token_refresh), tokens)
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_network() {
        let (coordinator, _tokens) = coordinator();
        let error = coordinator.refresh().await.unwrap_err();
        assert!(matches!(error, RefreshError::MissingRefreshToken));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn expired_beyond_grace_fails_fast() {
        let (coordinator, tokens) = coordinator();
        tokens.set_access_token(jwt_expiring_in(-600)).unwrap();
        tokens.set_refresh_token("refresh").unwrap();

        let error = coordinator.refresh().await.unwrap_err();
        match error {
            RefreshError::GracePeriodExceeded {
                expired_for,
                grace_period,
            } => {
                assert!(expired_for >= 600);
                assert_eq!(grace_period, 120);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!coordinator.is_refreshing());
        assert_eq!(tokens.refresh_token(), None);
        assert_eq!(tokens.access_token_last_known_expiry(), None);
    }

    #[tokio::test]
    async fn lazily_dropped_access_token_still_counts_for_grace() {
        let (coordinator, tokens) = coordinator();
        tokens.set_access_token(jwt_expiring_in(-600)).unwrap();
        tokens.set_refresh_token("refresh").unwrap();
        assert_eq!(tokens.access_token(), None);

        let error = coordinator.refresh().await.unwrap_err();
        assert!(matches!(error, RefreshError::GracePeriodExceeded { .. }));
    }

    #[test]
    fn grace_period_boundaries() {
        let tokens = TokenStore::in_memory(TokenKeys::default());
        assert!(check_grace_period(&tokens, 120).is_ok());

        tokens.set_access_token("opaque").unwrap();
        assert!(check_grace_period(&tokens, 0).is_ok());

        tokens.set_access_token(jwt_expiring_in(-60)).unwrap();
        assert!(check_grace_period(&tokens, 120).is_ok());
        assert!(check_grace_period(&tokens, 30).is_err());

        tokens.set_access_token(jwt_expiring_in(60)).unwrap();
        assert!(check_grace_period(&tokens, 0).is_ok());
    }
}

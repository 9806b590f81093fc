//! Authenticated request pipeline for the Catchup Feed backend.

pub mod articles;
pub mod error;
pub mod navigation;
pub mod retry;
pub mod sources;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use articles::ArticlesApi;
pub use error::{ApiError, ApiResult, ErrorKind};
pub use navigation::{Navigator, NoopNavigator, LOGIN_PATH};
pub use sources::SourcesApi;

use crate::auth::{TokenRefresher, TokenStore};
use crate::config::{ClientConfig, RetryPolicy, TokenRefreshConfig};

const USER_AGENT: &str = concat!("catchup-core/", env!("CARGO_PKG_VERSION"));

/// Retry behavior for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum RetrySetting {
    /// The client's configured policy.
    #[default]
    Inherit,
    Disabled,
    Custom(RetryPolicy),
}

/// Per-request parameters for [`ApiClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    body: Option<Value>,
    headers: HeaderMap,
    requires_auth: bool,
    timeout: Option<Duration>,
    retry: RetrySetting,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
            requires_auth: true,
            timeout: None,
            retry: RetrySetting::Inherit,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post(body: Value) -> Self {
        Self::new(Method::POST).body(body)
    }

    pub fn put(body: Value) -> Self {
        Self::new(Method::PUT).body(body)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Extra headers. They override the pipeline's defaults.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Skip the bearer header and the proactive refresh.
    #[must_use]
    pub const fn without_auth(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetrySetting::Custom(retry);
        self
    }

    #[must_use]
    pub const fn no_retry(mut self) -> Self {
        self.retry = RetrySetting::Disabled;
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub const fn requires_auth(&self) -> bool {
        self.requires_auth
    }
}

/// HTTP client bound to one backend, token store and navigator.
///
/// Cloning is cheap; clones share the connection pool and token store.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    refresh: TokenRefreshConfig,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl ApiClient {
    /// A client without proactive refresh. See [`Self::with_refresher`].
    pub fn new(
        config: &ClientConfig,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> ApiResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| ApiError::InvalidRequest(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            retry: config.retry,
            refresh: config.token_refresh,
            tokens,
            navigator,
            refresher: None,
        })
    }

    /// A clone of this client that refreshes expiring tokens through `refresher`.
    #[must_use]
    pub fn with_refresher(&self, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            refresher: Some(refresher),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(path, RequestOptions::get()).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(path, RequestOptions::post(to_body(body)?))
            .await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(path, RequestOptions::put(to_body(body)?)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(path, RequestOptions::delete()).await
    }

    /// Perform one logical request: proactive refresh, dispatch with timeout,
    /// response classification and retry with backoff.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        if options.requires_auth {
            self.refresh_if_expiring().await;
        }

        let url = self.url(path);
        let timeout = options.timeout.unwrap_or(self.timeout);
        let policy = match options.retry {
            RetrySetting::Inherit => Some(self.retry),
            RetrySetting::Disabled => None,
            RetrySetting::Custom(policy) => Some(policy),
        };

        let mut attempt = 0;
        let body = loop {
            match self.send_once(&url, &options, timeout).await {
                Ok(body) => break body,
                Err(error) => {
                    let Some(policy) = policy
                        .filter(|policy| error.is_retryable() && attempt < policy.max_retries)
                    else {
                        return Err(error);
                    };
                    let delay = retry::backoff_delay(&policy, attempt);
                    tracing::debug!(
                        "{} {} failed on attempt {} ({}), retrying in {}ms",
                        options.method,
                        path,
                        attempt + 1,
                        error,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        decode_body(&body)
    }

    async fn refresh_if_expiring(&self) {
        let Some(refresher) = &self.refresher else {
            return;
        };
        if !self.refresh.enabled {
            return;
        }
        let access_key = &self.tokens.keys().access;
        if !self
            .tokens
            .is_expiring_soon(access_key, Some(self.refresh.expiry_threshold_secs))
        {
            return;
        }
        if self.tokens.refresh_token().is_none() {
            return;
        }

        if let Err(error) = refresher.refresh().await {
            tracing::warn!(
                "Proactive token refresh failed, continuing with current token: {}",
                error
            );
        }
    }

    async fn send_once(
        &self,
        url: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> ApiResult<String> {
        let mut request = self
            .http
            .request(options.method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .timeout(timeout);

        if options.requires_auth {
            if let Some(token) = self.tokens.access_token() {
                request = request.bearer_auth(token);
            }
        }
        if !options.headers.is_empty() {
            request = request.headers(options.headers.clone());
        }
        if let Some(body) = &options.body {
            request = request.body(body.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|error| ApiError::from_transport(&error, timeout))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.expire_session();
            return Err(ApiError::Auth);
        }

        let body = response
            .text()
            .await
            .map_err(|error| ApiError::from_transport(&error, timeout))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::from_status(status.as_u16(), &body))
        }
    }

    fn expire_session(&self) {
        tracing::warn!("Backend rejected credentials, clearing session");
        self.tokens.clear_all();
        self.navigator.navigate(LOGIN_PATH);
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("refreshes", &self.refresher.is_some())
            .finish_non_exhaustive()
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> ApiResult<Value> {
    serde_json::to_value(body).map_err(|error| ApiError::InvalidRequest(error.to_string()))
}

/// Empty bodies (204, empty 200) decode as JSON `null`.
fn decode_body<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    let parsed = if body.trim().is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_str(body)
    };
    parsed.map_err(|error| ApiError::Decode(error.to_string()))
}

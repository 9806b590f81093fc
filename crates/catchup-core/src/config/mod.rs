//! Client configuration.
//!
//! Provides `ClientConfig`, the single source for token storage key names,
//! retry and timeout defaults, and the proactive refresh policy. Values are
//! read from `CATCHUP_*` environment variables with validated defaults.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_ACCESS_TOKEN_KEY: &str = "catchup_feed_auth_token";
pub const DEFAULT_REFRESH_TOKEN_KEY: &str = "catchup_feed_refresh_token";
pub const DEFAULT_SYNC_CHANNEL_CAPACITY: usize = 64;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Retry behavior for one logical request.
///
/// The delay before retry `n` (zero based) is
/// `min(max_delay, initial_delay * backoff_multiplier^n)` plus up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
        }
    }
}

/// Storage slot names for the two tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenKeys {
    pub access: String,
    pub refresh: String,
}

impl Default for TokenKeys {
    fn default() -> Self {
        Self {
            access: DEFAULT_ACCESS_TOKEN_KEY.to_string(),
            refresh: DEFAULT_REFRESH_TOKEN_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRefreshConfig {
    /// Proactive refresh before dispatching authenticated requests.
    pub enabled: bool,
    /// Remaining validity (seconds) at or below which a token is "expiring soon".
    pub expiry_threshold_secs: i64,
    /// How long after expiry a refresh may still be attempted.
    pub grace_period_secs: i64,
    /// Additional attempts after the first refresh call fails.
    pub retry_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for TokenRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiry_threshold_secs: 300,
            grace_period_secs: 120,
            retry_attempts: 2,
            initial_delay: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub token_keys: TokenKeys,
    pub token_refresh: TokenRefreshConfig,
    pub sync_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retry: RetryPolicy::default(),
            token_keys: TokenKeys::default(),
            token_refresh: TokenRefreshConfig::default(),
            sync_channel_capacity: DEFAULT_SYNC_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Config pointing at `api_base_url` with every other value defaulted.
    pub fn with_base_url(api_base_url: impl AsRef<str>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url.as_ref(), "api_base_url")?,
            ..Self::default()
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(
            &value_or_default(&lookup, "CATCHUP_API_URL", DEFAULT_API_BASE_URL),
            "CATCHUP_API_URL",
        )?;

        let request_timeout_ms = parse_in_range(
            &lookup,
            "CATCHUP_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
            100..=300_000,
        )?;

        let defaults = RetryPolicy::default();
        let max_retries = parse_in_range(&lookup, "CATCHUP_RETRY_MAX_RETRIES", 3, 0..=10)?;
        let initial_delay_ms =
            parse_in_range(&lookup, "CATCHUP_RETRY_INITIAL_DELAY_MS", 1_000, 0..=60_000)?;
        let max_delay_ms =
            parse_in_range(&lookup, "CATCHUP_RETRY_MAX_DELAY_MS", 10_000, 0..=300_000)?;
        if max_delay_ms < initial_delay_ms {
            return Err(ConfigError::Invalid(
                "CATCHUP_RETRY_MAX_DELAY_MS must be >= CATCHUP_RETRY_INITIAL_DELAY_MS".to_string(),
            ));
        }
        let backoff_multiplier = match optional_trimmed(&lookup, "CATCHUP_RETRY_BACKOFF_MULTIPLIER")
        {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|value| (1.0..=10.0).contains(value))
                .ok_or_else(|| {
                    ConfigError::Invalid(
                        "CATCHUP_RETRY_BACKOFF_MULTIPLIER must be a number in [1, 10]".to_string(),
                    )
                })?,
            None => defaults.backoff_multiplier,
        };

        let token_keys = TokenKeys {
            access: value_or_default(&lookup, "CATCHUP_ACCESS_TOKEN_KEY", DEFAULT_ACCESS_TOKEN_KEY),
            refresh: value_or_default(
                &lookup,
                "CATCHUP_REFRESH_TOKEN_KEY",
                DEFAULT_REFRESH_TOKEN_KEY,
            ),
        };
        if token_keys.access == token_keys.refresh {
            return Err(ConfigError::Invalid(
                "CATCHUP_ACCESS_TOKEN_KEY and CATCHUP_REFRESH_TOKEN_KEY must differ".to_string(),
            ));
        }

        let refresh_defaults = TokenRefreshConfig::default();
        let enabled = match optional_trimmed(&lookup, "CATCHUP_TOKEN_REFRESH_ENABLED") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::Invalid("CATCHUP_TOKEN_REFRESH_ENABLED must be true or false".to_string())
            })?,
            None => refresh_defaults.enabled,
        };
        let expiry_threshold_secs =
            parse_in_range(&lookup, "CATCHUP_TOKEN_EXPIRY_THRESHOLD_SECS", 300, 0..=86_400)?;
        let grace_period_secs =
            parse_in_range(&lookup, "CATCHUP_TOKEN_GRACE_PERIOD_SECS", 120, 0..=86_400)?;
        let retry_attempts = parse_in_range(&lookup, "CATCHUP_TOKEN_REFRESH_RETRIES", 2, 0..=10)?;
        let refresh_delay_ms =
            parse_in_range(&lookup, "CATCHUP_TOKEN_REFRESH_DELAY_MS", 1_000, 0..=60_000)?;

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
            retry: RetryPolicy {
                max_retries: u32::try_from(max_retries).unwrap_or(defaults.max_retries),
                initial_delay: Duration::from_millis(initial_delay_ms),
                max_delay: Duration::from_millis(max_delay_ms),
                backoff_multiplier,
            },
            token_keys,
            token_refresh: TokenRefreshConfig {
                enabled,
                expiry_threshold_secs: i64::try_from(expiry_threshold_secs)
                    .unwrap_or(refresh_defaults.expiry_threshold_secs),
                grace_period_secs: i64::try_from(grace_period_secs)
                    .unwrap_or(refresh_defaults.grace_period_secs),
                retry_attempts: u32::try_from(retry_attempts)
                    .unwrap_or(refresh_defaults.retry_attempts),
                initial_delay: Duration::from_millis(refresh_delay_ms),
            },
            sync_channel_capacity: DEFAULT_SYNC_CHANNEL_CAPACITY,
        })
    }
}

/// Validate and strip the trailing slash from an API base URL.
pub fn normalize_base_url(raw: &str, field: &str) -> Result<String, ConfigError> {
    let value = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| ConfigError::Invalid(format!("{field} must not be empty")))?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must start with http:// or https://"
        )))
    }
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    raw.parse::<u64>()
        .ok()
        .filter(|value| range.contains(value))
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "{name} must be an integer in [{}, {}]",
                range.start(),
                range.end()
            ))
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

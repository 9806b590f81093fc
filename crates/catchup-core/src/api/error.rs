//! Request pipeline error types

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::util::{compact_text, normalize_text_option};

/// Stable classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Auth,
    Network,
    Timeout,
    Client,
    Server,
    Decode,
    InvalidRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Client => "client",
            Self::Server => "server",
            Self::Decode => "decode",
            Self::InvalidRequest => "invalid-request",
        };
        formatter.write_str(label)
    }
}

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// 401 response. Tokens have been cleared and login navigation requested.
    #[error("Authentication required")]
    Auth,

    /// Transport-level failure (DNS, refused connection, dropped connection).
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its deadline and was aborted.
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// 4xx other than 401.
    #[error("{message}")]
    Client {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// 5xx.
    #[error("{message}")]
    Server {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// Successful response whose body did not match the expected shape.
    #[error("Invalid response payload: {0}")]
    Decode(String),

    /// The request could not be built (bad input, unserializable body, bad config).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    details: Option<Value>,
}

impl ApiError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth => ErrorKind::Auth,
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Client { .. } => ErrorKind::Client,
            Self::Server { .. } => ErrorKind::Server,
            Self::Decode(_) => ErrorKind::Decode,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Network, timeout and 5xx failures may succeed on a later attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Server
        )
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Auth => Some(401),
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub const fn details(&self) -> Option<&Value> {
        match self {
            Self::Client { details, .. } | Self::Server { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Build the error for a non-2xx, non-401 response from its raw body.
    ///
    /// Uses `{message, details}` when the body carries them, otherwise a
    /// generic status message.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let (message, details) = match parsed {
            Some(payload) => (
                normalize_text_option(payload.message).map(|message| compact_text(&message)),
                payload.details,
            ),
            None => (None, None),
        };
        let message = message.unwrap_or_else(|| format!("Request failed with status {status}"));

        if status >= 500 {
            Self::Server {
                status,
                message,
                details,
            }
        } else {
            Self::Client {
                status,
                message,
                details,
            }
        }
    }

    pub(crate) fn from_transport(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(error.to_string())
        }
    }
}

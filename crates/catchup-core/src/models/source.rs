//! Feed source model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ApiResult};
use crate::util::{is_http_url, normalize_text_option};

/// Backend-assigned source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub i64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// A feed the crawler pulls articles from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub feed_url: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub last_crawled_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSourceInput {
    pub name: String,
    pub feed_url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl CreateSourceInput {
    pub fn new(name: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feed_url: feed_url.into(),
            active: true,
        }
    }

    /// Trimmed copy, or an error naming the first invalid field.
    pub fn validated(&self) -> ApiResult<Self> {
        let name = normalize_text_option(Some(self.name.clone()))
            .ok_or_else(|| ApiError::InvalidRequest("Source name is required".to_string()))?;
        let feed_url = self.feed_url.trim().to_string();
        if !is_http_url(&feed_url) {
            return Err(ApiError::InvalidRequest(
                "Feed URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(Self {
            name,
            feed_url,
            active: self.active,
        })
    }
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSourceInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl UpdateSourceInput {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.feed_url.is_none() && self.active.is_none()
    }

    /// Trimmed copy, or an error naming the first invalid field.
    pub fn validated(&self) -> ApiResult<Self> {
        if self.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Nothing to update: set a name, feed URL or active flag".to_string(),
            ));
        }
        let name = match &self.name {
            Some(name) => Some(normalize_text_option(Some(name.clone())).ok_or_else(|| {
                ApiError::InvalidRequest("Source name must not be empty".to_string())
            })?),
            None => None,
        };
        let feed_url = match &self.feed_url {
            Some(url) if is_http_url(url.trim()) => Some(url.trim().to_string()),
            Some(_) => {
                return Err(ApiError::InvalidRequest(
                    "Feed URL must start with http:// or https://".to_string(),
                ))
            }
            None => None,
        };
        Ok(Self {
            name,
            feed_url,
            active: self.active,
        })
    }
}

use std::sync::Arc;

use catchup_core::config::normalize_base_url;
use catchup_core::{Article, ClientConfig, FeedClient, Source};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{KeyringTokenPersistence, ReloginNotice};
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

const TITLE_PREVIEW_CHARS: usize = 72;

#[derive(Debug, Serialize)]
pub struct ArticleListItem {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub published_at: Option<String>,
    pub relative_time: String,
}

/// A client for the resolved profile, with tokens kept in the OS keychain.
pub fn open_client(global_profile: Option<&str>) -> Result<(String, FeedClient), CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = profiles.resolve_profile_name(global_profile);
    let config = client_config_for(&profiles, &profile_name)?;

    let client = FeedClient::builder(config)
        .persistence(Arc::new(KeyringTokenPersistence::new(&profile_name)))
        .navigator(Arc::new(ReloginNotice::new(&profile_name)))
        .build()?;
    tracing::debug!(
        profile = %profile_name,
        base_url = client.api().base_url(),
        persistent = client.tokens().is_persistent(),
        "Client ready"
    );
    Ok((profile_name, client))
}

/// Environment config with the profile's `api_base_url` layered on top.
pub fn client_config_for(
    profiles: &CliProfilesConfig,
    profile_name: &str,
) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = profiles.profile(profile_name).and_then(CliProfile::api_base_url) {
        config.api_base_url = normalize_base_url(&url, "api_base_url")?;
    }
    Ok(config)
}

/// Refresh an expired session if possible, failing when nobody is signed in.
pub async fn require_session(profile_name: &str, client: &FeedClient) -> Result<(), CliError> {
    if client.auth().restore_session().await? {
        Ok(())
    } else {
        Err(CliError::NotSignedIn(profile_name.to_string()))
    }
}

pub fn article_to_list_item(article: &Article, now: DateTime<Utc>) -> ArticleListItem {
    let date = article.display_date();
    ArticleListItem {
        id: article.id.0,
        source_id: article.source_id.0,
        title: article.title.clone(),
        url: article.url.clone(),
        published_at: date.map(|value| value.to_rfc3339()),
        relative_time: date.map_or_else(
            || "-".to_string(),
            |value| format_relative_time(value, now),
        ),
    }
}

pub fn format_article_lines(articles: &[Article], now: DateTime<Utc>) -> Vec<String> {
    articles
        .iter()
        .map(|article| {
            let item = article_to_list_item(article, now);
            format!(
                "{:>6}  {:<width$}  ({})",
                item.id,
                title_preview(&item.title, TITLE_PREVIEW_CHARS),
                item.relative_time,
                width = TITLE_PREVIEW_CHARS
            )
        })
        .collect()
}

pub fn format_article_detail(article: &Article) -> String {
    let mut lines = vec![
        article.title.clone(),
        article.url.clone(),
        format!("source: {}", article.source_id),
    ];
    if let Some(date) = article.display_date() {
        lines.push(format!("published: {}", date.format("%Y-%m-%d %H:%M UTC")));
    }
    if !article.summary.trim().is_empty() {
        lines.push(String::new());
        lines.push(article.summary.trim().to_string());
    }
    lines.join("\n")
}

pub fn format_source_lines(sources: &[Source]) -> Vec<String> {
    sources.iter().map(format_source_line).collect()
}

pub fn format_source_line(source: &Source) -> String {
    let status = if source.active { "active" } else { "paused" };
    format!(
        "{:>4}  {:<24}  {:<7}  {}",
        source.id,
        title_preview(&source.name, 24),
        status,
        source.feed_url
    )
}

pub fn title_preview(title: &str, max_chars: usize) -> String {
    let title = title.trim();
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let mut preview: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    preview.push_str("...");
    preview
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - timestamp).num_seconds().max(0);
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3_600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3_600)
    } else if seconds < 604_800 {
        format!("{}d ago", seconds / 86_400)
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

pub fn format_expiry(expires_at: Option<i64>) -> String {
    expires_at
        .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
        .map_or_else(
            || "unknown".to_string(),
            |date| date.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

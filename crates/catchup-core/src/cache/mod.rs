//! Keyed query cache shared by resource reads and optimistic mutations.
//!
//! Entries hold JSON values. Writers always replace an entry wholesale, and
//! readers get clones. Each entry carries a fetch generation: cancelling a
//! key bumps it, and a fetch that started under an older generation drops
//! its result instead of overwriting newer data.

pub mod optimistic;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use optimistic::{optimistic_update, patch_entry, remove_entry, restore_entry};

use crate::api::ApiResult;

/// Stable identity of a cached query, e.g. `["sources"]` or `["sources", "7"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn child(&self, part: impl ToString) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.to_string());
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// True when `prefix` is this key or one of its ancestors.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0.join("/"))
    }
}

/// Cache operations the optimistic mutation pattern depends on.
pub trait MutationCache: Send + Sync {
    /// Logically cancel in-flight fetches for `key` and its descendants.
    fn cancel_queries(&self, key: &QueryKey);
    fn snapshot(&self, key: &QueryKey) -> Option<Value>;
    fn write(&self, key: &QueryKey, value: Value);
    /// Put `snapshot` back verbatim; `None` removes the data.
    fn restore(&self, key: &QueryKey, snapshot: Option<Value>);
    /// Mark `key` and its descendants stale so the next read refetches.
    fn invalidate(&self, key: &QueryKey);
}

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    data: Option<Value>,
    stale: bool,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.snapshot(key)?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(error) => {
                tracing::warn!("Cached value for '{}' has an unexpected shape: {}", key, error);
                None
            }
        }
    }

    pub fn set_data<T: Serialize + ?Sized>(
        &self,
        key: &QueryKey,
        data: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        self.write(key, value);
        Ok(())
    }

    /// Missing entries are stale.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock()
            .get(key)
            .is_none_or(|entry| entry.stale || entry.data.is_none())
    }

    pub fn remove(&self, key: &QueryKey) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Fresh cached data for `key`, or the result of `fetcher`.
    ///
    /// The fetched value is cached only if `key` was not cancelled while the
    /// fetch was in flight.
    pub async fn fetch_query<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if !self.is_stale(key) {
            if let Some(data) = self.get_data(key) {
                return Ok(data);
            }
        }

        let generation = self.generation(key);
        let data = fetcher().await?;
        match serde_json::to_value(&data) {
            Ok(value) => self.store_fetched(key, generation, value),
            Err(error) => tracing::warn!("Failed to cache '{}': {}", key, error),
        }
        Ok(data)
    }

    fn generation(&self, key: &QueryKey) -> u64 {
        self.lock().get(key).map_or(0, |entry| entry.generation)
    }

    fn store_fetched(&self, key: &QueryKey, generation: u64, value: Value) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        if entry.generation != generation {
            tracing::debug!("Discarding cancelled fetch for '{}'", key);
            return;
        }
        entry.data = Some(value);
        entry.stale = false;
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MutationCache for QueryCache {
    fn cancel_queries(&self, key: &QueryKey) {
        let mut entries = self.lock();
        entries.entry(key.clone()).or_default();
        for (candidate, entry) in entries.iter_mut() {
            if candidate.starts_with(key) {
                entry.generation += 1;
            }
        }
    }

    fn snapshot(&self, key: &QueryKey) -> Option<Value> {
        self.lock().get(key).and_then(|entry| entry.data.clone())
    }

    fn write(&self, key: &QueryKey, value: Value) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.data = Some(value);
        entry.stale = false;
    }

    fn restore(&self, key: &QueryKey, snapshot: Option<Value>) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.data = snapshot;
    }

    fn invalidate(&self, key: &QueryKey) {
        for (candidate, entry) in self.lock().iter_mut() {
            if candidate.starts_with(key) {
                entry.stale = true;
            }
        }
    }
}

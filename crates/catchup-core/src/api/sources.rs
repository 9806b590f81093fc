//! Source endpoints with optimistic updates and deletes.

use std::sync::Arc;

use serde_json::Value;

use super::{ApiClient, ApiError, ApiResult};
use crate::cache::{
    optimistic_update, patch_entry, remove_entry, restore_entry, MutationCache, QueryCache,
    QueryKey,
};
use crate::models::{CreateSourceInput, Source, SourceId, UpdateSourceInput};

#[derive(Debug, Clone)]
pub struct SourcesApi {
    api: ApiClient,
    cache: Arc<QueryCache>,
}

impl SourcesApi {
    pub const fn new(api: ApiClient, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub fn list_key() -> QueryKey {
        QueryKey::new(["sources"])
    }

    pub fn detail_key(id: SourceId) -> QueryKey {
        Self::list_key().child(id)
    }

    pub async fn list(&self) -> ApiResult<Vec<Source>> {
        self.cache
            .fetch_query(&Self::list_key(), || self.api.get("/sources"))
            .await
    }

    pub async fn get(&self, id: SourceId) -> ApiResult<Source> {
        let path = source_path(id);
        self.cache
            .fetch_query(&Self::detail_key(id), || self.api.get(&path))
            .await
    }

    pub async fn create(&self, input: &CreateSourceInput) -> ApiResult<Source> {
        let input = input.validated()?;
        let created: Source = self.api.post("/sources", &input).await?;
        self.cache.invalidate(&Self::list_key());
        tracing::info!("Created source {} ({})", created.id, created.name);
        Ok(created)
    }

    /// Patch the cached list immediately, then send the update.
    ///
    /// A failed request rolls the cached list back before returning the error.
    pub async fn update(&self, id: SourceId, input: &UpdateSourceInput) -> ApiResult<Source> {
        let input = input.validated()?;
        let patch =
            serde_json::to_value(&input).map_err(|error| ApiError::InvalidRequest(error.to_string()))?;
        let id_value = Value::from(id.0);
        let path = source_path(id);

        optimistic_update(
            &*self.cache,
            &Self::list_key(),
            |current| patch_entry(current, &id_value, &patch),
            |current, snapshot| restore_entry(current, snapshot, &id_value),
            || self.api.put(&path, &input),
        )
        .await
    }

    /// Remove the source from the cached list immediately, then delete it.
    pub async fn delete(&self, id: SourceId) -> ApiResult<()> {
        let id_value = Value::from(id.0);
        let path = source_path(id);

        optimistic_update(
            &*self.cache,
            &Self::list_key(),
            |current| remove_entry(current, &id_value),
            |current, snapshot| restore_entry(current, snapshot, &id_value),
            || self.api.delete::<Option<Value>>(&path),
        )
        .await?;
        self.cache.remove(&Self::detail_key(id));
        Ok(())
    }
}

fn source_path(id: SourceId) -> String {
    format!("/sources/{id}")
}

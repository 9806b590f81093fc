//! Article endpoints.

use std::sync::Arc;

use super::{ApiClient, ApiResult};
use crate::cache::{MutationCache, QueryCache, QueryKey};
use crate::models::{Article, ArticleId};

#[derive(Debug, Clone)]
pub struct ArticlesApi {
    api: ApiClient,
    cache: Arc<QueryCache>,
}

impl ArticlesApi {
    pub const fn new(api: ApiClient, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub fn list_key() -> QueryKey {
        QueryKey::new(["articles"])
    }

    pub fn detail_key(id: ArticleId) -> QueryKey {
        Self::list_key().child(id)
    }

    pub async fn list(&self) -> ApiResult<Vec<Article>> {
        self.cache
            .fetch_query(&Self::list_key(), || self.api.get("/articles"))
            .await
    }

    pub async fn get(&self, id: ArticleId) -> ApiResult<Article> {
        let path = format!("/articles/{id}");
        self.cache
            .fetch_query(&Self::detail_key(id), || self.api.get(&path))
            .await
    }

    /// Drop cached articles so the next read hits the backend.
    pub fn invalidate(&self) {
        self.cache.invalidate(&Self::list_key());
    }
}

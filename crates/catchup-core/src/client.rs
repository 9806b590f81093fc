//! Composition root for the client services.

use std::sync::Arc;

use crate::api::{ApiClient, ArticlesApi, Navigator, NoopNavigator, SourcesApi};
use crate::auth::{
    AuthService, NoopNotifier, PeerNotifier, RefreshCoordinator, TokenPersistence, TokenStore,
};
use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::Result;

pub struct FeedClientBuilder {
    config: ClientConfig,
    persistence: Option<Arc<dyn TokenPersistence>>,
    notifier: Arc<dyn PeerNotifier>,
    navigator: Arc<dyn Navigator>,
}

impl FeedClientBuilder {
    #[must_use]
    pub fn persistence(mut self, persistence: Arc<dyn TokenPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn PeerNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn build(self) -> Result<FeedClient> {
        let config = self.config;
        let tokens = Arc::new(
            TokenStore::new(config.token_keys.clone(), self.persistence, self.notifier)
                .with_expiry_threshold(config.token_refresh.expiry_threshold_secs),
        );

        let base = ApiClient::new(&config, Arc::clone(&tokens), self.navigator)?;
        let refresher = RefreshCoordinator::new(base.clone(), config.token_refresh);
        let api = base.with_refresher(Arc::new(refresher.clone()));

        Ok(FeedClient {
            config: Arc::new(config),
            tokens,
            api,
            refresher,
            cache: Arc::new(QueryCache::new()),
        })
    }
}

/// Every service wired to one token store, one pipeline and one cache.
#[derive(Clone)]
pub struct FeedClient {
    config: Arc<ClientConfig>,
    tokens: Arc<TokenStore>,
    api: ApiClient,
    refresher: RefreshCoordinator,
    cache: Arc<QueryCache>,
}

impl FeedClient {
    pub fn builder(config: ClientConfig) -> FeedClientBuilder {
        FeedClientBuilder {
            config,
            persistence: None,
            notifier: Arc::new(NoopNotifier),
            navigator: Arc::new(NoopNavigator),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// The authenticated pipeline.
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    pub const fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub const fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.api.clone(), self.refresher.clone())
    }

    pub fn articles(&self) -> ArticlesApi {
        ArticlesApi::new(self.api.clone(), Arc::clone(&self.cache))
    }

    pub fn sources(&self) -> SourcesApi {
        SourcesApi::new(self.api.clone(), Arc::clone(&self.cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryPersistence;

    #[test]
    fn builder_wires_shared_token_store() {
        let persistence = Arc::new(MemoryPersistence::new());
        let client = FeedClient::builder(ClientConfig::default())
            .persistence(persistence.clone())
            .build()
            .unwrap();

        assert!(client.tokens().is_persistent());
        client.auth().tokens().set_access_token("shared").unwrap();
        assert_eq!(client.tokens().access_token().as_deref(), Some("shared"));
        assert_eq!(client.api().tokens().access_token().as_deref(), Some("shared"));
        assert_eq!(persistence.snapshot().len(), 1);
        assert!(!client.refresher().is_refreshing());
    }

    #[test]
    fn services_share_one_cache() {
        let client = FeedClient::builder(ClientConfig::default()).build().unwrap();
        client
            .cache()
            .set_data(&SourcesApi::list_key(), &Vec::<u8>::new())
            .unwrap();
        assert!(!client.cache().is_stale(&SourcesApi::list_key()));
        assert_eq!(client.config().api_base_url, "http://localhost:8080");
    }
}

//! In-memory token store with persistent mirroring and peer sync.
//!
//! The in-memory map is the source of truth. Persistence and peer broadcast
//! are mirrors: their failures are logged and never change what `get`
//! returns to the calling instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::jwt::token_expiry;
use super::persistence::TokenPersistence;
use super::sync::{NoopNotifier, PeerNotifier, TokenSyncEnvelope, TokenSyncMessage};
use super::{AuthError, AuthResult};
use crate::config::{TokenKeys, TokenRefreshConfig};
use crate::util::unix_timestamp_now;

/// A stored token and its `exp` claim, when it has one.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub value: String,
    pub expires_at: Option<i64>,
}

impl TokenRecord {
    fn from_value(value: String) -> Self {
        let expires_at = token_expiry(&value);
        Self { value, expires_at }
    }

    fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenRecord")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

type TokenMap = HashMap<String, TokenRecord>;

/// `exp` of records dropped because they expired, keyed like [`TokenMap`].
type LapsedMap = HashMap<String, i64>;

pub struct TokenStore {
    id: Uuid,
    keys: TokenKeys,
    expiry_threshold_secs: i64,
    tokens: Arc<Mutex<TokenMap>>,
    lapsed: Arc<Mutex<LapsedMap>>,
    persistence: Option<Arc<dyn TokenPersistence>>,
    notifier: Arc<dyn PeerNotifier>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl TokenStore {
    /// A store with no persistence and no peers.
    pub fn in_memory(keys: TokenKeys) -> Self {
        Self::new(keys, None, Arc::new(NoopNotifier))
    }

    /// Build a store, probing `persistence` and subscribing to `notifier`.
    ///
    /// An unusable persistence backend is dropped and the store runs
    /// memory-only. Peer messages are only consumed when a Tokio runtime is
    /// available to run the listener.
    pub fn new(
        keys: TokenKeys,
        persistence: Option<Arc<dyn TokenPersistence>>,
        notifier: Arc<dyn PeerNotifier>,
    ) -> Self {
        let persistence = persistence.and_then(|backend| match backend.probe() {
            Ok(()) => Some(backend),
            Err(error) => {
                tracing::warn!("Token persistence unavailable, using memory only: {}", error);
                None
            }
        });

        let id = Uuid::now_v7();
        let tokens = Arc::new(Mutex::new(TokenMap::new()));
        let lapsed = Arc::new(Mutex::new(LapsedMap::new()));
        let listener = notifier.subscribe().and_then(|rx| {
            spawn_listener(id, Arc::clone(&tokens), Arc::clone(&lapsed), rx)
        });

        let store = Self {
            id,
            keys,
            expiry_threshold_secs: TokenRefreshConfig::default().expiry_threshold_secs,
            tokens,
            lapsed,
            persistence,
            notifier,
            listener: Mutex::new(listener),
        };
        store.load_persisted();
        store
    }

    /// Default threshold used by [`Self::is_expiring_soon`] when none is given.
    #[must_use]
    pub fn with_expiry_threshold(mut self, seconds: i64) -> Self {
        self.expiry_threshold_secs = seconds;
        self
    }

    pub const fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    pub const fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    pub fn is_synchronized(&self) -> bool {
        self.lock_listener().is_some()
    }

    /// Token value for `key`. An expired record is deleted and `None` returned.
    ///
    /// The deleted record's expiry stays readable through
    /// [`Self::last_known_expiry`].
    pub fn get(&self, key: &str) -> Option<String> {
        let now = unix_timestamp_now();
        let record = self.lock_tokens().get(key).cloned()?;
        if record.is_expired_at(now) {
            tracing::debug!("Token '{}' expired, removing", key);
            self.remove(key);
            if let Some(expires_at) = record.expires_at {
                self.lock_lapsed().insert(key.to_string(), expires_at);
            }
            return None;
        }
        Some(record.value)
    }

    /// Store `value` under `key`, reading its expiry from the `exp` claim.
    ///
    /// Only a failure of the in-memory write is an error.
    pub fn set(&self, key: &str, value: impl Into<String>) -> AuthResult<()> {
        let record = TokenRecord::from_value(value.into());
        {
            let mut tokens = self
                .tokens
                .lock()
                .map_err(|error| AuthError::Storage(error.to_string()))?;
            tokens.insert(key.to_string(), record.clone());
        }
        self.lock_lapsed().remove(key);

        if let Some(persistence) = &self.persistence {
            if let Err(error) = persistence.save(key, &record.value) {
                tracing::warn!("Failed to persist token '{}': {}", key, error);
            }
        }
        self.broadcast(TokenSyncMessage::Set {
            key: key.to_string(),
            value: record.value,
            expires_at: record.expires_at,
        });
        Ok(())
    }

    pub fn remove(&self, key: &str) {
        self.lock_tokens().remove(key);
        self.lock_lapsed().remove(key);
        self.unpersist(key);
        self.broadcast(TokenSyncMessage::Remove {
            key: key.to_string(),
        });
    }

    pub fn clear_all(&self) {
        let removed: Vec<String> = self.lock_tokens().drain().map(|(key, _)| key).collect();
        self.lock_lapsed().clear();
        for key in self.persisted_keys(removed) {
            self.unpersist(&key);
        }
        self.broadcast(TokenSyncMessage::Clear);
    }

    pub fn token_expiry(&self, key: &str) -> Option<i64> {
        self.lock_tokens().get(key)?.expires_at
    }

    /// Expiry of the live record, or of the record last dropped for expiring.
    ///
    /// Explicit removal, `clear_all` and a fresh `set` forget the lapsed value.
    pub fn last_known_expiry(&self, key: &str) -> Option<i64> {
        self.token_expiry(key)
            .or_else(|| self.lock_lapsed().get(key).copied())
    }

    /// True iff `0 < expires_at - now <= threshold`.
    ///
    /// A token without a known expiry is never expiring soon, so this alone
    /// cannot detect a missing token.
    pub fn is_expiring_soon(&self, key: &str, threshold_secs: Option<i64>) -> bool {
        let Some(expires_at) = self.token_expiry(key) else {
            return false;
        };
        let remaining = expires_at - unix_timestamp_now();
        remaining > 0 && remaining <= threshold_secs.unwrap_or(self.expiry_threshold_secs)
    }

    /// Expired by `exp`; without expiry metadata, expired iff no value exists.
    pub fn is_expired(&self, key: &str) -> bool {
        let tokens = self.lock_tokens();
        match tokens.get(key) {
            Some(record) => record.is_expired_at(unix_timestamp_now()),
            None => true,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(&self.keys.access)
    }

    pub fn set_access_token(&self, token: impl Into<String>) -> AuthResult<()> {
        self.set(&self.keys.access, token)
    }

    pub fn access_token_expiry(&self) -> Option<i64> {
        self.token_expiry(&self.keys.access)
    }

    pub fn access_token_last_known_expiry(&self) -> Option<i64> {
        self.last_known_expiry(&self.keys.access)
    }

    pub fn is_access_token_expiring_soon(&self) -> bool {
        self.is_expiring_soon(&self.keys.access, None)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(&self.keys.refresh)
    }

    pub fn set_refresh_token(&self, token: impl Into<String>) -> AuthResult<()> {
        self.set(&self.keys.refresh, token)
    }

    /// Drop both session tokens.
    pub fn clear_tokens(&self) {
        self.clear_all();
    }

    /// Stop consuming peer messages. The store keeps working single-instance.
    pub fn destroy(&self) {
        if let Some(listener) = self.lock_listener().take() {
            listener.abort();
        }
    }

    fn load_persisted(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };

        for key in [&self.keys.access, &self.keys.refresh] {
            match persistence.load(key) {
                Ok(Some(value)) => {
                    self.lock_tokens()
                        .insert(key.clone(), TokenRecord::from_value(value));
                }
                Ok(None) => {}
                Err(error) => tracing::warn!("Failed to load persisted token '{}': {}", key, error),
            }
        }
    }

    fn persisted_keys(&self, mut keys: Vec<String>) -> Vec<String> {
        for key in [&self.keys.access, &self.keys.refresh] {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    fn unpersist(&self, key: &str) {
        if let Some(persistence) = &self.persistence {
            if let Err(error) = persistence.remove(key) {
                tracing::warn!("Failed to remove persisted token '{}': {}", key, error);
            }
        }
    }

    fn broadcast(&self, message: TokenSyncMessage) {
        let envelope = TokenSyncEnvelope {
            origin: self.id,
            message,
        };
        if let Err(error) = self.notifier.publish(envelope) {
            tracing::warn!("Failed to broadcast token change: {}", error);
        }
    }

    fn lock_tokens(&self) -> MutexGuard<'_, TokenMap> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_lapsed(&self) -> MutexGuard<'_, LapsedMap> {
        self.lapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TokenStore {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenStore")
            .field("id", &self.id)
            .field("keys", &self.keys)
            .field("persistent", &self.is_persistent())
            .field("synchronized", &self.is_synchronized())
            .finish_non_exhaustive()
    }
}

fn spawn_listener(
    origin: Uuid,
    tokens: Arc<Mutex<TokenMap>>,
    lapsed: Arc<Mutex<LapsedMap>>,
    mut rx: broadcast::Receiver<TokenSyncEnvelope>,
) -> Option<JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::debug!("No async runtime; token store runs without peer sync");
        return None;
    };

    Some(runtime.spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) if envelope.origin == origin => {}
                Ok(envelope) => apply_peer_message(&tokens, &lapsed, envelope.message),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Token sync listener skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }))
}

/// A peer's `Remove` of an already expired record keeps its expiry as lapsed.
fn apply_peer_message(
    tokens: &Mutex<TokenMap>,
    lapsed: &Mutex<LapsedMap>,
    message: TokenSyncMessage,
) {
    tracing::debug!("Applying peer token change: {:?}", message);
    let mut tokens = tokens.lock().unwrap_or_else(PoisonError::into_inner);
    let mut lapsed = lapsed.lock().unwrap_or_else(PoisonError::into_inner);
    match message {
        TokenSyncMessage::Set {
            key,
            value,
            expires_at,
        } => {
            lapsed.remove(&key);
            tokens.insert(key, TokenRecord { value, expires_at });
        }
        TokenSyncMessage::Remove { key } => {
            let expired = tokens
                .remove(&key)
                .filter(|record| record.is_expired_at(unix_timestamp_now()))
                .and_then(|record| record.expires_at);
            match expired {
                Some(expires_at) => {
                    lapsed.insert(key, expires_at);
                }
                None => {
                    lapsed.remove(&key);
                }
            }
        }
        TokenSyncMessage::Clear => {
            tokens.clear();
            lapsed.clear();
        }
    }
}

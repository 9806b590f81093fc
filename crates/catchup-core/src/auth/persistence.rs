//! Best-effort persistent mirrors for the token store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{AuthError, AuthResult};

const PROBE_KEY: &str = "__catchup_storage_probe__";

/// Key-value storage that survives the process (OS keyring, browser storage).
///
/// The token store treats every implementation as optional: a failing
/// backend degrades the store to memory-only, it never fails a token read or
/// write.
pub trait TokenPersistence: Send + Sync {
    fn load(&self, key: &str) -> AuthResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> AuthResult<()>;
    fn remove(&self, key: &str) -> AuthResult<()>;

    /// Write and delete a sentinel entry to check the backend is usable.
    fn probe(&self) -> AuthResult<()> {
        self.save(PROBE_KEY, "probe")?;
        self.remove(PROBE_KEY)
    }
}

/// Process-local persistence, useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry, as if written by a previous run.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        self
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenPersistence for MemoryPersistence {
    fn load(&self, key: &str) -> AuthResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> AuthResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

//! Keychain-backed token persistence and session-expiry notice for the CLI.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use catchup_core::api::{Navigator, LOGIN_PATH};
use catchup_core::auth::{AuthError, AuthResult, TokenPersistence};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "catchup-cli";

/// One keychain entry per `profile:token_key`, so profiles never share tokens.
#[derive(Debug, Clone)]
pub struct KeyringTokenPersistence {
    profile: String,
}

impl KeyringTokenPersistence {
    pub fn new(profile_name: &str) -> Self {
        Self {
            profile: profile_name.to_string(),
        }
    }

    fn username(&self, key: &str) -> String {
        format!("{}:{key}", self.profile)
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self, key: &str) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username(key))
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl TokenPersistence for KeyringTokenPersistence {
    #[cfg(not(test))]
    fn load(&self, key: &str) -> AuthResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self, key: &str) -> AuthResult<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(guard.get(&self.username(key)).cloned())
    }

    #[cfg(not(test))]
    fn save(&self, key: &str, value: &str) -> AuthResult<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save(&self, key: &str, value: &str) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username(key), value.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn remove(&self, key: &str) -> AuthResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn remove(&self, key: &str) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username(key));
        Ok(())
    }
}

/// A terminal has no login screen to redirect to, so tell the user how to sign in again.
#[derive(Debug, Clone)]
pub struct ReloginNotice {
    profile: String,
}

impl ReloginNotice {
    pub fn new(profile_name: &str) -> Self {
        Self {
            profile: profile_name.to_string(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Session for profile '{}' has expired. Run `catchup auth login --profile {} --email <email>`.",
            self.profile, self.profile
        )
    }
}

impl Navigator for ReloginNotice {
    fn navigate(&self, path: &str) {
        if path == LOGIN_PATH {
            eprintln!("{}", self.message());
        } else {
            tracing::debug!(path, "Ignoring navigation request");
        }
    }
}

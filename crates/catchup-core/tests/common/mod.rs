//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use catchup_core::config::{ClientConfig, RetryPolicy};
use catchup_core::{FeedClient, Navigator};

/// Unsigned JWT whose `exp` is `seconds` from now (negative for the past).
pub fn jwt_expiring_in(seconds: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + seconds;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

/// Records every navigation request.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

/// Config with short delays so retry paths finish quickly.
pub fn config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::with_base_url(base_url).unwrap();
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
    };
    config.token_refresh.initial_delay = Duration::from_millis(10);
    config
}

pub fn client_with(config: ClientConfig) -> (FeedClient, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::default());
    let client = FeedClient::builder(config)
        .navigator(navigator.clone())
        .build()
        .unwrap();
    (client, navigator)
}

pub fn client(base_url: &str) -> (FeedClient, Arc<RecordingNavigator>) {
    client_with(config(base_url))
}

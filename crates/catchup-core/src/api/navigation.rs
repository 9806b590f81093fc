//! Navigation requests raised by the pipeline.

/// Where an expired session sends the user.
pub const LOGIN_PATH: &str = "/login";

/// Host-specific handling of "go to this screen" requests.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Logs navigation requests and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!("Navigation to '{}' requested", path);
    }
}

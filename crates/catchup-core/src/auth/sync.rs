//! Cross-instance token synchronization.
//!
//! Every token store publishes its mutations so that peer instances (other
//! windows, tabs or workers sharing the same session) converge on the same
//! in-memory state. Delivery is best effort and last-write-wins.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::AuthResult;

/// A single token store mutation, as seen by peers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenSyncMessage {
    Set {
        key: String,
        value: String,
        #[serde(rename = "expiresAt", default)]
        expires_at: Option<i64>,
    },
    Remove {
        key: String,
    },
    Clear,
}

impl fmt::Debug for TokenSyncMessage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set {
                key, expires_at, ..
            } => formatter
                .debug_struct("Set")
                .field("key", key)
                .field("value", &"[REDACTED]")
                .field("expires_at", expires_at)
                .finish(),
            Self::Remove { key } => formatter.debug_struct("Remove").field("key", key).finish(),
            Self::Clear => formatter.write_str("Clear"),
        }
    }
}

/// A message tagged with the instance that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSyncEnvelope {
    pub origin: Uuid,
    pub message: TokenSyncMessage,
}

/// Transport for token sync messages.
pub trait PeerNotifier: Send + Sync {
    fn publish(&self, envelope: TokenSyncEnvelope) -> AuthResult<()>;

    /// A receiver for peer messages, or `None` when the transport cannot
    /// deliver to this instance.
    fn subscribe(&self) -> Option<broadcast::Receiver<TokenSyncEnvelope>>;
}

/// Single-instance operation: nothing is sent, nothing is received.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl PeerNotifier for NoopNotifier {
    fn publish(&self, _envelope: TokenSyncEnvelope) -> AuthResult<()> {
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<TokenSyncEnvelope>> {
        None
    }
}

/// In-process broadcast hub. Clone it once per peer.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<TokenSyncEnvelope>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn peer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl PeerNotifier for BroadcastNotifier {
    fn publish(&self, envelope: TokenSyncEnvelope) -> AuthResult<()> {
        // An error here only means no peer is currently listening.
        let _ = self.tx.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<TokenSyncEnvelope>> {
        Some(self.tx.subscribe())
    }
}

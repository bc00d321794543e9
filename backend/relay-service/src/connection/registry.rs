/// Live Connection Registry
///
/// Single source of truth for "is this token live, and how do I hand it a
/// message". Supports:
/// - At most one live connection per token
/// - Non-blocking lookups that never block each other
/// - Idempotent unregistration
/// - Drop-on-full outbound queues so producers never wait on slow clients

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::metrics;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client already listening for this token")]
    AlreadyRegistered,
}

/// Result of a non-blocking enqueue onto a connection's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Queue at capacity; the line was dropped
    QueueFull,
    /// The owning connection is tearing down
    Disconnected,
}

impl EnqueueOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnqueueOutcome::Queued => "queued",
            EnqueueOutcome::QueueFull => "queue_full",
            EnqueueOutcome::Disconnected => "disconnected",
        }
    }
}

/// Producer side of one connection's bounded outbound queue
///
/// Producers only ever enqueue. The receiving half belongs to the
/// connection handler, which is the only party that closes the queue.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    tx: mpsc::Sender<String>,
}

impl OutboundHandle {
    /// Create a queue holding at most `capacity` undelivered lines
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting; a full queue drops the line.
    pub fn try_deliver(&self, line: String) -> EnqueueOutcome {
        match self.tx.try_send(line) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => EnqueueOutcome::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Disconnected,
        }
    }

    pub fn same_queue(&self, other: &OutboundHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Registry of live connections keyed by token
///
/// Cheap to clone; clones share the same map. Construct one per process and
/// hand it to the TCP front door and the dispatch router.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, OutboundHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the outbound queue of a freshly handshaken connection
    ///
    /// Fails without touching the existing entry when the token is already live.
    pub async fn register(&self, token: &str, handle: OutboundHandle) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(token) {
            return Err(RegistryError::AlreadyRegistered);
        }
        connections.insert(token.to_string(), handle);
        metrics::set_live_connections(connections.len());
        Ok(())
    }

    pub async fn lookup(&self, token: &str) -> Option<OutboundHandle> {
        self.connections.read().await.get(token).cloned()
    }

    /// Remove the entry for `token`; returns whether one was present.
    pub async fn unregister(&self, token: &str) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(token).is_some();
        metrics::set_live_connections(connections.len());
        removed
    }

    pub async fn is_connected(&self, token: &str) -> bool {
        self.connections.read().await.contains_key(token)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connected_tokens(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }
}

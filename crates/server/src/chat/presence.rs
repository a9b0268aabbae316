//! Presence Registry
//!
//! Maps a user id to its single live connection handle. Purely in-memory:
//! liveness is not audit data and never touches the database. The registry
//! lives for the process lifetime; horizontal scale-out would need a shared
//! backplane or sticky routing.

use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::protocol::ServerFrame;

/// One live connection. The sender feeds the connection's writer task;
/// `conn_id` identifies this particular socket across reconnects.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    pub conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl ClientHandle {
    pub fn new(conn_id: Uuid, tx: mpsc::UnboundedSender<ServerFrame>) -> Self {
        Self { conn_id, tx }
    }

    /// Best-effort push. Returns false if the connection is gone.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// user_id -> live handle; at most one entry per user.
pub struct PresenceRegistry {
    inner: RwLock<HashMap<i64, ClientHandle>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Set the live handle for `user_id`, superseding any prior handle.
    pub async fn register(&self, user_id: i64, handle: ClientHandle) {
        let prior = self.inner.write().await.insert(user_id, handle);
        if prior.is_some() {
            debug!("[Presence] user {} reconnected, handle superseded", user_id);
        }
    }

    /// Clear the handle for `user_id` only if `conn_id` still matches the
    /// registered one. A disconnect from an already-superseded socket must
    /// not wipe out the newer handle.
    pub async fn clear(&self, user_id: i64, conn_id: Uuid) -> bool {
        let mut map = self.inner.write().await;
        match map.get(&user_id) {
            Some(current) if current.conn_id == conn_id => {
                map.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, user_id: i64) -> Option<ClientHandle> {
        self.inner.read().await.get(&user_id).cloned()
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    /// Push a frame to `user_id`'s live handle, if any. Returns whether the
    /// frame was accepted by a live connection.
    pub async fn push_to(&self, user_id: i64, frame: ServerFrame) -> bool {
        match self.inner.read().await.get(&user_id) {
            Some(handle) => handle.send(frame),
            None => false,
        }
    }

    /// Push a frame to every live connection except `except`. Best effort.
    pub async fn broadcast_except(&self, except: i64, frame: ServerFrame) {
        for (user_id, handle) in self.inner.read().await.iter() {
            if *user_id != except {
                handle.send(frame.clone());
            }
        }
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

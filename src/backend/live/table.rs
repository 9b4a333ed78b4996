/**
 * Connection Table
 *
 * Process-local map from nonce to the live socket handle for connections
 * owned by this process. Only the owning process can write to a socket, so
 * this map is never consulted for another process's connections; cross-process
 * access always goes through the registry plus a control ping.
 */

use crate::backend::error::BackendError;
use crate::backend::live::render::RequestTemplate;
use crate::shared::Nonce;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one held long-poll stream
///
/// Cloning is cheap; every clone writes to the same stream.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    /// Distinguishes successive sockets that reuse a nonce
    pub id: u64,
    pub nonce: Nonce,
    pub url: String,
    /// The attach request, replayed on every re-render
    pub template: RequestTemplate,
    /// Log context for everything done on behalf of this connection
    pub span: tracing::Span,
    pub opened_at: Instant,
    sender: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(
        nonce: Nonce,
        url: String,
        template: RequestTemplate,
        span: tracing::Span,
        sender: mpsc::UnboundedSender<Bytes>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            nonce,
            url,
            template,
            span,
            opened_at: Instant::now(),
            sender,
            cancel,
        }
    }

    /// Queue one chunk (a payload line or a heartbeat) on the stream
    pub fn send(&self, chunk: Bytes) -> Result<(), BackendError> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::ConnectionClosed {
                nonce: self.nonce.clone(),
            });
        }
        self.sender.send(chunk).map_err(|_| BackendError::ConnectionClosed {
            nonce: self.nonce.clone(),
        })
    }

    /// End the stream; the heartbeat and refresh tasks stop with it
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Nonce → handle map for sockets held by this process
#[derive(Clone, Debug, Default)]
pub struct ConnectionTable {
    connections: Arc<Mutex<HashMap<Nonce, ConnectionHandle>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Nonce, ConnectionHandle>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a handle, returning the one it displaced
    pub fn insert(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.lock().insert(handle.nonce.clone(), handle)
    }

    pub fn get(&self, nonce: &Nonce) -> Option<ConnectionHandle> {
        self.lock().get(nonce).cloned()
    }

    pub fn contains(&self, nonce: &Nonce) -> bool {
        self.lock().contains_key(nonce)
    }

    pub fn remove(&self, nonce: &Nonce) -> Option<ConnectionHandle> {
        self.lock().remove(nonce)
    }

    /// Remove the entry only if it is still the socket identified by `id`
    pub fn remove_if(&self, nonce: &Nonce, id: u64) -> bool {
        let mut connections = self.lock();
        match connections.get(nonce) {
            Some(handle) if handle.id == id => {
                connections.remove(nonce);
                true
            }
            _ => false,
        }
    }

    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.lock().values().cloned().collect()
    }

    pub fn nonces(&self) -> Vec<Nonce> {
        let mut nonces: Vec<Nonce> = self.lock().keys().cloned().collect();
        nonces.sort();
        nonces
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Close and drop every socket
    pub fn close_all(&self) -> usize {
        let drained: Vec<ConnectionHandle> = self.lock().drain().map(|(_, handle)| handle).collect();
        for handle in &drained {
            handle.close();
        }
        drained.len()
    }
}

/**
 * Connection Lifecycle
 *
 * Opening a connection inserts a handle in the table and starts two tasks:
 * the heartbeat, which writes a blank line every heartbeat interval, and the
 * forced refresh, which periodically marks the connection's own row pending
 * so its page is re-rendered even when nothing announced a change.
 *
 * Closing is owned by the stream body: a guard inside the body state removes
 * the table entry and deletes the registry row when the body is dropped.
 */

use crate::backend::error::BackendError;
use crate::backend::live::render::RequestTemplate;
use crate::backend::live::state::LiveState;
use crate::backend::live::stream::{channel_body, HEARTBEAT};
use crate::backend::live::table::ConnectionHandle;
use crate::shared::Nonce;
use axum::body::Body;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Cleanup tied to the lifetime of a stream body
struct ConnectionGuard {
    live: LiveState,
    nonce: Nonce,
    id: u64,
    span: tracing::Span,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.live.table().get(&self.nonce) {
            if handle.id == self.id {
                handle.close();
            }
        }

        // An abort or the reaper may already have taken the entry; they own
        // the row cleanup in that case.
        if !self.live.table().remove_if(&self.nonce, self.id) {
            return;
        }

        let _entered = self.span.enter();
        tracing::info!("[Live] Connection closed");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("[Live] No runtime to delete row {}; the zombie check will", self.nonce);
            return;
        };

        let live = self.live.clone();
        let nonce = self.nonce.clone();
        runtime.spawn(
            async move {
                if let Err(e) = live.registry().delete(&nonce).await {
                    tracing::warn!("[Live] Failed to delete row {}: {}", nonce, e);
                }
            }
            .instrument(self.span.clone()),
        );
    }
}

impl LiveState {
    /// Open a held stream for an attached nonce
    ///
    /// The registry row must already be attached to this process. Returns the
    /// handle used to push to the stream and the body to hand to the client.
    pub fn open_connection(
        &self,
        nonce: Nonce,
        url: String,
        template: RequestTemplate,
    ) -> (ConnectionHandle, Body) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = self.shutdown_token().child_token();
        let span = tracing::info_span!(
            "live_connection",
            nonce = %nonce,
            url = %url,
            process = %self.process()
        );

        let handle = ConnectionHandle::new(nonce, url, template, span.clone(), sender, cancel.clone());
        if let Some(previous) = self.table().insert(handle.clone()) {
            previous.close();
        }
        span.in_scope(|| tracing::info!("[Live] Connection opened"));

        tokio::spawn(heartbeat_loop(self.clone(), handle.clone()).instrument(span.clone()));
        tokio::spawn(forced_refresh_loop(self.clone(), handle.clone()).instrument(span.clone()));

        let guard = ConnectionGuard {
            live: self.clone(),
            nonce: handle.nonce.clone(),
            id: handle.id,
            span,
        };
        let body = channel_body(receiver, cancel, guard);
        (handle, body)
    }

    /// Handle a `Live-Connection-Abort`: close the socket if held here,
    /// delete the row, and tell siblings so whichever holds it lets go
    pub async fn abort_connection(&self, nonce: &Nonce) -> Result<(), BackendError> {
        if let Some(handle) = self.table().remove(nonce) {
            handle.close();
            handle.span.in_scope(|| tracing::info!("[Live] Connection aborted by client"));
        }

        let deleted = self.registry().delete(nonce).await?;
        if deleted {
            tracing::debug!("[Live] Deleted aborted row {}", nonce);
            self.schedule_ping();
        }
        Ok(())
    }
}

async fn heartbeat_loop(live: LiveState, handle: ConnectionHandle) {
    let every = live.config().heartbeat;
    loop {
        tokio::select! {
            _ = handle.cancel_token().cancelled() => break,
            _ = tokio::time::sleep(every.sample()) => {}
        }
        if handle.send(Bytes::from_static(HEARTBEAT)).is_err() {
            break;
        }
        tracing::trace!("[Live] Heartbeat");
    }
}

async fn forced_refresh_loop(live: LiveState, handle: ConnectionHandle) {
    let every = live.config().forced_refresh;
    loop {
        tokio::select! {
            _ = handle.cancel_token().cancelled() => break,
            _ = tokio::time::sleep(every.sample()) => {}
        }

        match live.registry().mark_pending_nonce(&handle.nonce, Utc::now()).await {
            Ok(true) => {
                tracing::debug!("[Live] Forced refresh scheduled");
                live.wake_local();
            }
            Ok(false) => {
                tracing::debug!("[Live] Row gone; stopping forced refresh");
                break;
            }
            Err(e) => tracing::warn!("[Live] Failed to mark forced refresh: {}", e),
        }
    }
}

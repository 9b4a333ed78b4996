/**
 * Change Notification and Drain
 *
 * `notify_changed` marks every attached row under a URL prefix as pending and
 * schedules one debounced ping to each sibling process. A ping (or a local
 * change) wakes the drain worker, which re-renders and pushes every pending
 * connection this process owns, spacing pushes apart so a burst of changes
 * does not turn into a burst of renders.
 *
 * Pending marks are cleared with a compare on the timestamp that was read,
 * so a mark made during the render survives and is drained next time.
 */

use crate::backend::error::BackendError;
use crate::backend::live::render::{render_page, LiveContext};
use crate::backend::live::state::LiveState;
use crate::backend::live::stream::encode_line;
use crate::backend::live::table::ConnectionHandle;
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::Instrument;

/// Outcome of one drain pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Connections re-rendered and pushed
    pub pushed: usize,
    /// Re-renders or writes that failed; their marks stay set
    pub failed: usize,
    /// Pending rows with no socket in this process's table
    pub skipped: usize,
}

impl LiveState {
    /// Announce that content under `url_prefix` changed
    ///
    /// Returns the number of connections marked. Siblings are pinged after
    /// the debounce window; this process is woken immediately.
    pub async fn notify_changed(&self, url_prefix: &str) -> Result<u64, BackendError> {
        let marked = self.registry().mark_pending(url_prefix, Utc::now()).await?;
        tracing::debug!("[Notifier] {} marked {} connection(s) under {}", self.process(), marked, url_prefix);

        if marked > 0 {
            self.wake_local();
            self.schedule_ping();
        }
        Ok(marked)
    }

    /// Wake this process's drain worker
    pub fn wake_local(&self) {
        self.inner().wake.notify_one();
    }

    /// Ping every sibling once after the debounce window
    ///
    /// Calls made while a ping is already waiting fold into it.
    pub fn schedule_ping(&self) {
        if self.config().sibling_control_urls().is_empty() {
            return;
        }
        if self.inner().ping_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let live = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = live.shutdown_token().cancelled() => return,
                _ = tokio::time::sleep(live.config().notify_debounce) => {}
            }
            live.inner().ping_scheduled.store(false, Ordering::Release);
            live.ping_siblings().await;
        });
    }

    /// POST to every sibling's control endpoint; returns how many answered
    ///
    /// Failures are logged and otherwise ignored: an unreachable sibling
    /// still drains on its forced refresh.
    pub async fn ping_siblings(&self) -> usize {
        let urls = self.config().sibling_control_urls();
        let requests = urls.iter().map(|url| {
            let http = self.inner().http.clone();
            async move {
                match http.post(url).send().await {
                    Ok(response) if response.status().is_success() => true,
                    Ok(response) => {
                        tracing::warn!("[Notifier] Ping to {} answered {}", url, response.status());
                        false
                    }
                    Err(e) => {
                        tracing::warn!("[Notifier] Ping to {} failed: {}", url, e);
                        false
                    }
                }
            }
        });

        let delivered = join_all(requests).await.into_iter().filter(|ok| *ok).count();
        tracing::debug!("[Notifier] Pinged {}/{} sibling(s)", delivered, urls.len());
        delivered
    }

    /// Re-render and push every pending connection owned by this process
    pub async fn drain_pending(&self) -> Result<DrainReport, BackendError> {
        let pending = self.registry().pending_owned_by(self.process()).await?;
        let mut report = DrainReport::default();

        for update in pending {
            let Some(handle) = self.table().get(&update.nonce) else {
                report.skipped += 1;
                continue;
            };

            if report.pushed + report.failed > 0 {
                tokio::time::sleep(self.config().push_spacing.sample()).await;
            }

            let span = handle.span.clone();
            match self.push_update(&handle).instrument(span.clone()).await {
                Ok(()) => {
                    report.pushed += 1;
                    let cleared = self
                        .registry()
                        .clear_pending(&update.nonce, update.pending_seq)
                        .await?;
                    if !cleared {
                        span.in_scope(|| tracing::debug!("[Notifier] Marked again during render"));
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    span.in_scope(|| tracing::error!("[Notifier] Push failed: {}", e));
                }
            }
        }

        if report != DrainReport::default() {
            tracing::debug!(
                "[Notifier] Drain: {} pushed, {} failed, {} skipped",
                report.pushed,
                report.failed,
                report.skipped
            );
        }
        Ok(report)
    }

    /// Re-render one connection's page and write it to the stream
    pub async fn push_update(&self, handle: &ConnectionHandle) -> Result<(), BackendError> {
        let renderer = self.renderer()?;
        let request = handle.template.to_request(LiveContext::rerender(handle.nonce.clone()));
        let page = render_page(renderer.as_ref(), request, self.config().max_render_bytes).await?;
        handle.send(encode_line(&page)?)?;
        tracing::debug!("[Notifier] Pushed {} bytes", page.len());
        Ok(())
    }

    /// Close sockets whose registry row has disappeared
    ///
    /// Sockets opened after the ownership query started are left alone; their
    /// rows may not have been visible to it.
    pub async fn close_vanished_sockets(&self) -> Result<usize, BackendError> {
        let started = Instant::now();
        let owned: HashSet<_> = self
            .registry()
            .owned_by(self.process())
            .await?
            .into_iter()
            .collect();

        let mut closed = 0;
        for handle in self.table().handles() {
            if handle.opened_at >= started || owned.contains(&handle.nonce) {
                continue;
            }
            if self.table().remove_if(&handle.nonce, handle.id) {
                handle.close();
                handle.span.in_scope(|| tracing::info!("[Live] Row vanished; socket closed"));
                closed += 1;
            }
        }
        Ok(closed)
    }

    /// Drain whenever woken, until shutdown
    pub async fn run_drain_worker(self) {
        tracing::info!("[Notifier] Drain worker started for {}", self.process());
        loop {
            tokio::select! {
                _ = self.shutdown_token().cancelled() => break,
                _ = self.inner().wake.notified() => {}
            }

            if let Err(e) = self.drain_pending().await {
                tracing::error!("[Notifier] Drain failed: {}", e);
            }
            if let Err(e) = self.close_vanished_sockets().await {
                tracing::warn!("[Notifier] Vanished-socket check failed: {}", e);
            }
        }
        tracing::info!("[Notifier] Drain worker stopped");
    }
}

/**
 * Client Reconnector
 *
 * Holds one live stream open for a page, indefinitely.
 *
 * # Phases
 *
 * ```text
 * Connecting ──► Streaming ──► Reconnecting ──► Connecting ...
 *      │             │
 *      └─────────────┴──► Closing ──► Closed
 * ```
 *
 * - Each attempt sends `GET <path>` with `Live-Connection: <nonce>` and has
 *   its own cancellation token; beginning an attempt cancels the previous
 *   one. No byte for `idle_timeout` aborts the attempt.
 * - 422 is permanent: a reload notice is raised and the loop stops.
 * - A `Version` header differing from the page's version raises a new
 *   version notice and stops; nothing from that stream is applied.
 * - Stream lines are JSON strings of HTML, each handed to the sink. Blank
 *   lines are heartbeats.
 * - A disconnect raises the offline notice, waits a jittered backoff and
 *   retries with a freshly minted nonce.
 * - Closing sends a best-effort `Live-Connection-Abort` and stops.
 */

use crate::client::error::ClientError;
use crate::client::morph::MorphStats;
use crate::client::page::{header_text, LivePage, PayloadSink};
use crate::shared::{JitterRange, Nonce, LIVE_CONNECTION_ABORT_HEADER, LIVE_CONNECTION_HEADER, VERSION_HEADER};
use futures_util::StreamExt;
use reqwest::StatusCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Hard idle timeout on an attempt
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(50);
/// Wait before reconnecting
pub const DEFAULT_BACKOFF: JitterRange = JitterRange::from_millis(800, 1200);
/// Wait before reconnecting in fast-reload mode
pub const DEFAULT_FAST_BACKOFF: JitterRange = JitterRange::from_millis(150, 250);

const ABORT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Streaming,
    Reconnecting,
    Closing,
    Closed,
}

/// Something the user has to be told about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The stream dropped; the page may be stale until it reconnects
    Offline,
    /// The server refused this page; only a reload helps
    ReloadRequired { reason: String },
    /// The server runs a different build than the one that rendered the page
    NewVersion { page: String, server: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Phase(Phase),
    Notice(Notice),
    Applied(MorphStats),
}

/// Why `Reconnector::run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectorExit {
    Closed,
    ReloadRequired,
    NewVersion,
}

#[derive(Debug, Clone)]
pub struct ReconnectorConfig {
    /// Scheme and authority, e.g. `http://127.0.0.1:3000`
    pub base_url: String,
    /// Path and query the page was loaded from
    pub path: String,
    /// `Version` the page was rendered by
    pub page_version: String,
    pub idle_timeout: Duration,
    pub backoff: JitterRange,
    pub fast_backoff: JitterRange,
    pub fast_reload: bool,
}

impl ReconnectorConfig {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, page_version: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            page_version: page_version.into(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
            fast_backoff: DEFAULT_FAST_BACKOFF,
            fast_reload: false,
        }
    }

    pub fn for_page(base_url: impl Into<String>, page: &LivePage) -> Self {
        Self::new(base_url, page.path(), page.version())
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }

    fn backoff_delay(&self) -> Duration {
        if self.fast_reload {
            self.fast_backoff.sample()
        } else {
            self.backoff.sample()
        }
    }
}

/// Closes a running reconnector from outside
#[derive(Debug, Clone)]
pub struct ReconnectorHandle {
    close: CancellationToken,
}

impl ReconnectorHandle {
    /// Stop reconnecting; the current attempt is cancelled and aborted
    pub fn close(&self) {
        self.close.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }
}

pub struct Reconnector<S: PayloadSink> {
    config: ReconnectorConfig,
    http: reqwest::Client,
    sink: Arc<Mutex<S>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    close: CancellationToken,
    attempt: Option<CancellationToken>,
    nonce: Nonce,
}

impl<S: PayloadSink> Reconnector<S> {
    pub fn new(
        config: ReconnectorConfig,
        http: reqwest::Client,
        sink: Arc<Mutex<S>>,
        nonce: Nonce,
    ) -> (Self, ReconnectorHandle, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let close = CancellationToken::new();
        let handle = ReconnectorHandle { close: close.clone() };
        let reconnector = Self {
            config,
            http,
            sink,
            events,
            close,
            attempt: None,
            nonce,
        };
        (reconnector, handle, receiver)
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Run until closed or until a permanent failure
    pub async fn run(mut self) -> ReconnectorExit {
        tracing::info!("[Client] Live updates for {}", self.config.url());

        while !self.close.is_cancelled() {
            let token = self.begin_attempt();
            self.emit(ClientEvent::Phase(Phase::Connecting));

            let error = match self.attempt(&token).await {
                Ok(()) => {
                    tracing::info!("[Client] Stream for {} ended", self.nonce);
                    None
                }
                Err(ClientError::Cancelled) => break,
                Err(ClientError::AttachRejected { body }) => {
                    tracing::warn!("[Client] Attach of {} rejected: {}", self.nonce, body);
                    return self.stop(Notice::ReloadRequired { reason: body }, ReconnectorExit::ReloadRequired);
                }
                Err(ClientError::VersionSkew { page, server }) => {
                    tracing::warn!("[Client] Server is {:?}, page is {:?}", server, page);
                    return self.stop(Notice::NewVersion { page, server }, ReconnectorExit::NewVersion);
                }
                Err(e) if e.is_retryable() => Some(e),
                Err(e) => {
                    tracing::error!("[Client] Giving up on {}: {}", self.nonce, e);
                    return self.stop(
                        Notice::ReloadRequired { reason: e.to_string() },
                        ReconnectorExit::ReloadRequired,
                    );
                }
            };

            if let Some(e) = error {
                tracing::warn!("[Client] Stream for {} lost: {}", self.nonce, e);
                self.emit(ClientEvent::Notice(Notice::Offline));
            }
            self.emit(ClientEvent::Phase(Phase::Reconnecting));

            let delay = self.config.backoff_delay();
            tokio::select! {
                _ = self.close.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            // the old nonce is left for the reaper
            self.nonce = Nonce::generate();
        }

        self.emit(ClientEvent::Phase(Phase::Closing));
        self.send_abort().await;
        self.emit(ClientEvent::Phase(Phase::Closed));
        ReconnectorExit::Closed
    }

    fn begin_attempt(&mut self) -> CancellationToken {
        if let Some(previous) = self.attempt.take() {
            previous.cancel();
        }
        let token = self.close.child_token();
        self.attempt = Some(token.clone());
        token
    }

    fn stop(&self, notice: Notice, exit: ReconnectorExit) -> ReconnectorExit {
        self.emit(ClientEvent::Notice(notice));
        self.emit(ClientEvent::Phase(Phase::Closed));
        exit
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    async fn attempt(&self, token: &CancellationToken) -> Result<(), ClientError> {
        let idle = self.config.idle_timeout;
        let request = self
            .http
            .get(self.config.url())
            .header(LIVE_CONNECTION_HEADER, self.nonce.as_str());

        let response = tokio::select! {
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            sent = tokio::time::timeout(idle, request.send()) => match sent {
                Ok(result) => result?,
                Err(_) => return Err(ClientError::Timeout(idle)),
            },
        };

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::AttachRejected { body });
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        let server = header_text(response.headers(), VERSION_HEADER).unwrap_or_default();
        if server != self.config.page_version {
            return Err(ClientError::VersionSkew {
                page: self.config.page_version.clone(),
                server,
            });
        }

        self.emit(ClientEvent::Phase(Phase::Streaming));
        let mut stream = response.bytes_stream();
        let mut lines = LineDecoder::default();
        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return Err(ClientError::Cancelled),
                next = tokio::time::timeout(idle, stream.next()) => match next {
                    Err(_) => return Err(ClientError::Timeout(idle)),
                    Ok(None) => return Ok(()),
                    Ok(Some(chunk)) => chunk?,
                },
            };
            for line in lines.push(&chunk) {
                self.apply_line(&line);
            }
        }
    }

    fn apply_line(&self, line: &[u8]) {
        let html: String = match serde_json::from_slice(line) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("[Client] Skipping malformed line on {}: {}", self.nonce, e);
                return;
            }
        };

        let result = self
            .sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply_payload(&html);
        match result {
            Ok(stats) => {
                tracing::debug!("[Client] Applied update to {}: {:?}", self.config.path, stats);
                self.emit(ClientEvent::Applied(stats));
            }
            Err(e) => tracing::warn!("[Client] Failed to apply update to {}: {}", self.config.path, e),
        }
    }

    async fn send_abort(&self) {
        let result = self
            .http
            .head(self.config.url())
            .header(LIVE_CONNECTION_ABORT_HEADER, self.nonce.as_str())
            .timeout(ABORT_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(_) => tracing::debug!("[Client] Aborted {}", self.nonce),
            Err(e) => tracing::debug!("[Client] Abort of {} not delivered: {}", self.nonce, e),
        }
    }
}

/// Splits a byte stream into newline-terminated lines, dropping blank ones
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line);
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_decoder_joins_chunks_and_skips_heartbeats() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(b"\n\n\"<p>a").is_empty());
        let lines = decoder.push(b"</p>\"\n\r\n\"b\"\n\"c");
        assert_eq!(lines, vec![b"\"<p>a</p>\"".to_vec(), b"\"b\"".to_vec()]);
        assert_eq!(decoder.push(b"\"\n"), vec![b"\"c\"".to_vec()]);
    }

    #[test]
    fn test_backoff_follows_mode() {
        let mut config = ReconnectorConfig::new("http://localhost:1", "/", "v");
        let delay = config.backoff_delay();
        assert!(delay >= Duration::from_millis(800) && delay <= Duration::from_millis(1200));

        config.fast_reload = true;
        let delay = config.backoff_delay();
        assert!(delay >= Duration::from_millis(150) && delay <= Duration::from_millis(250));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let config = ReconnectorConfig::new("http://127.0.0.1:3000/", "/topics/1?x=1", "v");
        assert_eq!(config.url(), "http://127.0.0.1:3000/topics/1?x=1");
    }

    #[test]
    fn test_beginning_an_attempt_cancels_the_previous_one() {
        let page = LivePage::from_html("/", "<html></html>", None, "v").unwrap();
        let (mut reconnector, handle, _events) = Reconnector::new(
            ReconnectorConfig::new("http://localhost:1", "/", "v"),
            reqwest::Client::new(),
            Arc::new(Mutex::new(page)),
            Nonce::generate(),
        );

        let first = reconnector.begin_attempt();
        let second = reconnector.begin_attempt();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        handle.close();
        assert!(second.is_cancelled());
    }
}

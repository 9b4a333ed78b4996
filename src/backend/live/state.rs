/**
 * Live State
 *
 * Everything one process needs to hold and update live connections: its
 * configuration and identity, the shared registry, its own connection table,
 * the page renderer, and the wake signal that drives the drain worker.
 */

use crate::backend::error::BackendError;
use crate::backend::live::render::Renderer;
use crate::backend::live::table::ConnectionTable;
use crate::backend::registry::ConnectionRegistry;
use crate::shared::{LiveConfig, Nonce, ProcessId};
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared handle to the live-update machinery of one process
#[derive(Clone)]
pub struct LiveState {
    inner: Arc<LiveInner>,
}

pub(crate) struct LiveInner {
    pub(crate) config: LiveConfig,
    pub(crate) process: ProcessId,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) table: ConnectionTable,
    pub(crate) renderer: OnceLock<Arc<dyn Renderer>>,
    /// Woken by control pings and local changes; consumed by the drain worker
    pub(crate) wake: Notify,
    /// Set while a debounced sibling ping is waiting to fire
    pub(crate) ping_scheduled: AtomicBool,
    /// Rows seen without a local socket on the previous zombie check
    pub(crate) zombie_suspects: Mutex<HashSet<Nonce>>,
    pub(crate) http: reqwest::Client,
    pub(crate) shutdown: CancellationToken,
}

impl std::fmt::Debug for LiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveState")
            .field("process", &self.inner.process)
            .field("connections", &self.inner.table.len())
            .finish()
    }
}

impl LiveState {
    /// Create the live state for the process named in `config`
    ///
    /// The renderer is installed separately with [`LiveState::install_renderer`]
    /// because the page router usually needs this state first.
    pub fn new(config: LiveConfig, registry: ConnectionRegistry) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.ping_timeout)
            .build()
            .map_err(|e| {
                BackendError::handler(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to build control client: {}", e),
                )
            })?;

        Ok(Self {
            inner: Arc::new(LiveInner {
                process: ProcessId::from_index(config.process_index),
                config,
                registry,
                table: ConnectionTable::new(),
                renderer: OnceLock::new(),
                wake: Notify::new(),
                ping_scheduled: AtomicBool::new(false),
                zombie_suspects: Mutex::new(HashSet::new()),
                http,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Install the page renderer used for pushes; only the first call wins
    pub fn install_renderer(&self, renderer: Arc<dyn Renderer>) -> bool {
        self.inner.renderer.set(renderer).is_ok()
    }

    pub(crate) fn inner(&self) -> &LiveInner {
        &self.inner
    }

    pub fn config(&self) -> &LiveConfig {
        &self.inner.config
    }

    pub fn process(&self) -> &ProcessId {
        &self.inner.process
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.inner.table
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    pub(crate) fn renderer(&self) -> Result<Arc<dyn Renderer>, BackendError> {
        self.inner
            .renderer
            .get()
            .cloned()
            .ok_or_else(|| BackendError::render("no page renderer installed"))
    }

    /// Release rows left behind by an earlier run of this process
    ///
    /// Sockets do not survive a restart, so any row still naming this process
    /// as owner is stale.
    pub async fn release_stale_rows(&self) -> Result<u64, BackendError> {
        let released = self.registry().release_process(self.process()).await?;
        if released > 0 {
            tracing::info!(
                "[Live] Released {} stale connection(s) from a previous run of {}",
                released,
                self.process()
            );
        }
        Ok(released)
    }

    /// Start the drain worker and both reapers
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().run_drain_worker()),
            tokio::spawn(self.clone().run_expiry_reaper()),
            tokio::spawn(self.clone().run_zombie_reaper()),
        ]
    }

    /// Stop background work, close every socket and release this process's rows
    pub async fn shutdown(&self) -> Result<(), BackendError> {
        self.inner.shutdown.cancel();
        let closed = self.table().close_all();
        let released = self.registry().release_process(self.process()).await?;
        tracing::info!(
            "[Live] {} shut down: closed {} socket(s), released {} row(s)",
            self.process(),
            closed,
            released
        );
        Ok(())
    }
}

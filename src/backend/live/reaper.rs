/**
 * Reaper
 *
 * Two periodic sweeps keep the registry honest:
 *
 * - Expiry (process 0 only): delete unattached rows whose grace window ran
 *   out, i.e. pages that were served but never attached.
 * - Zombie check (every process): rows owned by this process with no socket
 *   in the table are deleted once they have been seen that way on two
 *   consecutive checks, and sockets whose row vanished are closed.
 */

use crate::backend::error::BackendError;
use crate::backend::live::state::LiveState;
use crate::shared::Nonce;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::PoisonError;

/// Outcome of one zombie check
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ZombieSweep {
    /// Rows deleted on their second sighting
    pub deleted_rows: Vec<Nonce>,
    /// Rows seen without a socket for the first time
    pub suspects: usize,
    /// Sockets closed because their row was gone
    pub closed_sockets: usize,
}

impl LiveState {
    /// Delete expired unattached rows
    pub async fn reap_expired(&self) -> Result<Vec<Nonce>, BackendError> {
        let deleted = self.registry().delete_expired(Utc::now()).await?;
        if !deleted.is_empty() {
            tracing::info!("[Reaper] Deleted {} expired unattached row(s)", deleted.len());
        }
        Ok(deleted)
    }

    /// Cross-check this process's rows against its table
    pub async fn reap_zombies(&self) -> Result<ZombieSweep, BackendError> {
        let owned = self.registry().owned_by(self.process()).await?;
        let previous = std::mem::take(
            &mut *self
                .inner()
                .zombie_suspects
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut sweep = ZombieSweep::default();
        let mut suspects = HashSet::new();
        for nonce in owned {
            if self.table().contains(&nonce) {
                continue;
            }
            if previous.contains(&nonce) {
                if self.registry().delete(&nonce).await? {
                    sweep.deleted_rows.push(nonce);
                }
            } else {
                suspects.insert(nonce);
            }
        }
        sweep.suspects = suspects.len();
        *self
            .inner()
            .zombie_suspects
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = suspects;

        sweep.closed_sockets = self.close_vanished_sockets().await?;

        if !sweep.deleted_rows.is_empty() || sweep.closed_sockets > 0 {
            tracing::info!(
                "[Reaper] {}: deleted {} zombie row(s), closed {} orphaned socket(s)",
                self.process(),
                sweep.deleted_rows.len(),
                sweep.closed_sockets
            );
        }
        Ok(sweep)
    }

    /// Periodic expiry sweep; returns at once on every process but 0
    pub async fn run_expiry_reaper(self) {
        if !self.config().is_reaper_process() {
            return;
        }
        tracing::info!("[Reaper] Expiry reaper started on {}", self.process());
        loop {
            tokio::select! {
                _ = self.shutdown_token().cancelled() => break,
                _ = tokio::time::sleep(self.config().reaper.sample()) => {}
            }
            if let Err(e) = self.reap_expired().await {
                tracing::error!("[Reaper] Expiry sweep failed: {}", e);
            }
        }
    }

    /// Periodic zombie check
    pub async fn run_zombie_reaper(self) {
        loop {
            tokio::select! {
                _ = self.shutdown_token().cancelled() => break,
                _ = tokio::time::sleep(self.config().zombie_check.sample()) => {}
            }
            if let Err(e) = self.reap_zombies().await {
                tracing::error!("[Reaper] Zombie check failed: {}", e);
            }
        }
    }
}

/**
 * Connection Registry
 *
 * The registry is the single source of truth about live connections shared
 * by every process of a deployment. It is a SQLite table keyed by nonce; no
 * in-memory state is trusted across process boundaries.
 *
 * # Atomicity
 *
 * Every mutation is a single SQL statement, so two processes racing on the
 * same nonce are serialized by SQLite. Attach in particular is an
 * `UPDATE ... WHERE expires_at IS NOT NULL AND url = ?` followed, only if no
 * row matched, by an `INSERT ... ON CONFLICT DO NOTHING`; at most one of the
 * racing processes can win either statement.
 *
 * # Timestamps
 *
 * Stored as unix milliseconds; converted to `DateTime<Utc>` at the edge.
 */

mod db;

use crate::shared::{ConnectionRecord, Nonce, ProcessId};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Result of an attach attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A registered unattached row was claimed by this process
    Claimed,
    /// No row existed; a new attached row was created
    Created,
    /// The attach is not allowed; the reason is for logs and the 422 body
    Rejected(String),
}

impl AttachOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// A row the owner must re-render, with the mark it observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub nonce: Nonce,
    pub pending_update_at: DateTime<Utc>,
    pub pending_seq: i64,
}

/// Handle to the shared connection registry
#[derive(Clone, Debug)]
pub struct ConnectionRegistry {
    pool: SqlitePool,
}

impl ConnectionRegistry {
    /// Open (creating if needed) the registry database and run migrations
    ///
    /// File databases use WAL journaling and a busy timeout so that sibling
    /// processes writing at the same moment wait instead of failing.
    pub async fn connect(database_url: &str) -> Result<Self, crate::backend::error::BackendError> {
        tracing::info!("[Registry] Connecting to {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.migrate().await?;
        Ok(registry)
    }

    /// Private in-memory registry (tests and single-process demos)
    ///
    /// An in-memory SQLite database lives as long as its connection, so the
    /// pool is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, crate::backend::error::BackendError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.migrate().await?;
        Ok(registry)
    }

    async fn migrate(&self) -> Result<(), crate::backend::error::BackendError> {
        sqlx::migrate!().run(&self.pool).await?;
        tracing::debug!("[Registry] Migrations applied");
        Ok(())
    }

    /// The underlying pool, shared with the page layer
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register a fresh unattached row for a rendered page
    pub async fn register_unattached(
        &self,
        nonce: &Nonce,
        url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        db::insert_unattached(&self.pool, nonce, url, expires_at, Utc::now()).await
    }

    /// Attach `nonce` for `url` to `owner`
    ///
    /// Accepted when the row does not exist (a client reconnecting with a
    /// freshly minted nonce) or when it is unattached and registered for the
    /// same URL. Everything else is rejected.
    pub async fn attach(
        &self,
        nonce: &Nonce,
        url: &str,
        owner: &ProcessId,
    ) -> Result<AttachOutcome, sqlx::Error> {
        if db::claim_unattached(&self.pool, nonce, url, owner).await? {
            return Ok(AttachOutcome::Claimed);
        }
        if db::insert_attached(&self.pool, nonce, url, owner, Utc::now()).await? {
            return Ok(AttachOutcome::Created);
        }

        let reason = match self.get(nonce).await? {
            Some(record) if record.is_attached() => "connection is already attached".to_string(),
            Some(record) => format!("nonce is registered for {}", record.url),
            // deleted between the two statements
            None => "connection vanished while attaching".to_string(),
        };
        Ok(AttachOutcome::Rejected(reason))
    }

    /// Look up a row
    pub async fn get(&self, nonce: &Nonce) -> Result<Option<ConnectionRecord>, sqlx::Error> {
        db::select_one(&self.pool, nonce).await
    }

    /// Delete a row; returns whether it existed
    pub async fn delete(&self, nonce: &Nonce) -> Result<bool, sqlx::Error> {
        db::delete_one(&self.pool, nonce).await
    }

    /// Mark every attached row under `url_prefix` as needing a push
    pub async fn mark_pending(&self, url_prefix: &str, at: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        db::mark_pending_prefix(&self.pool, url_prefix, at).await
    }

    /// Mark a single attached row as needing a push
    pub async fn mark_pending_nonce(&self, nonce: &Nonce, at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        db::mark_pending_nonce(&self.pool, nonce, at).await
    }

    /// Pending rows owned by `owner`, oldest mark first
    pub async fn pending_owned_by(&self, owner: &ProcessId) -> Result<Vec<PendingUpdate>, sqlx::Error> {
        db::select_pending(&self.pool, owner).await
    }

    /// Clear the pending mark, but only if it is still the one observed
    ///
    /// Every mark bumps `pending_seq`, so a mark set while the re-render was
    /// running survives for the next drain even within the same millisecond.
    pub async fn clear_pending(&self, nonce: &Nonce, observed_seq: i64) -> Result<bool, sqlx::Error> {
        db::clear_pending(&self.pool, nonce, observed_seq).await
    }

    /// Delete unattached rows whose grace window has passed
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<Nonce>, sqlx::Error> {
        db::delete_expired(&self.pool, now).await
    }

    /// Nonces of attached rows owned by `owner`
    pub async fn owned_by(&self, owner: &ProcessId) -> Result<Vec<Nonce>, sqlx::Error> {
        db::select_owned(&self.pool, owner).await
    }

    /// Delete every row owned by `owner`
    pub async fn release_process(&self, owner: &ProcessId) -> Result<u64, sqlx::Error> {
        db::delete_owned(&self.pool, owner).await
    }

    /// Total number of rows
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        db::count(&self.pool).await
    }
}

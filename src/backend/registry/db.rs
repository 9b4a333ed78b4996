/**
 * Registry SQL
 *
 * Single-statement queries over the `live_connections` table. Each function
 * is one atomic statement; callers compose them without transactions.
 */

use crate::backend::registry::PendingUpdate;
use crate::shared::{ConnectionRecord, Nonce, ProcessId};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    nonce: String,
    url: String,
    expires_at: Option<i64>,
    owner_process: Option<String>,
    pending_update_at: Option<i64>,
}

impl ConnectionRow {
    fn into_record(self) -> ConnectionRecord {
        ConnectionRecord {
            nonce: stored_nonce(self.nonce),
            url: self.url,
            expires_at: self.expires_at.and_then(from_millis),
            owner_process: self.owner_process.map(ProcessId::new),
            pending_update_at: self.pending_update_at.and_then(from_millis),
        }
    }
}

// Nonces are validated before they are written, so stored values are trusted.
fn stored_nonce(value: String) -> Nonce {
    Nonce::parse(&value).unwrap_or_else(|_| {
        tracing::warn!("[Registry] Malformed nonce in registry: {:?}", value);
        Nonce::generate()
    })
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

pub(crate) async fn insert_unattached(
    pool: &SqlitePool,
    nonce: &Nonce,
    url: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO live_connections (nonce, url, expires_at, owner_process, pending_update_at, created_at)
        VALUES (?, ?, ?, NULL, NULL, ?)
        "#,
    )
    .bind(nonce.as_str())
    .bind(url)
    .bind(to_millis(expires_at))
    .bind(to_millis(now))
    .execute(pool)
    .await?;

    Ok(())
}

/// Claim an unattached row registered for the same URL
pub(crate) async fn claim_unattached(
    pool: &SqlitePool,
    nonce: &Nonce,
    url: &str,
    owner: &ProcessId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE live_connections
        SET expires_at = NULL, owner_process = ?
        WHERE nonce = ? AND expires_at IS NOT NULL AND url = ?
        "#,
    )
    .bind(owner.as_str())
    .bind(nonce.as_str())
    .bind(url)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Create an attached row if no row exists for the nonce
pub(crate) async fn insert_attached(
    pool: &SqlitePool,
    nonce: &Nonce,
    url: &str,
    owner: &ProcessId,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO live_connections (nonce, url, expires_at, owner_process, pending_update_at, created_at)
        VALUES (?, ?, NULL, ?, NULL, ?)
        ON CONFLICT (nonce) DO NOTHING
        "#,
    )
    .bind(nonce.as_str())
    .bind(url)
    .bind(owner.as_str())
    .bind(to_millis(now))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn select_one(
    pool: &SqlitePool,
    nonce: &Nonce,
) -> Result<Option<ConnectionRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, ConnectionRow>(
        r#"
        SELECT nonce, url, expires_at, owner_process, pending_update_at
        FROM live_connections
        WHERE nonce = ?
        "#,
    )
    .bind(nonce.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ConnectionRow::into_record))
}

pub(crate) async fn delete_one(pool: &SqlitePool, nonce: &Nonce) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM live_connections WHERE nonce = ?")
        .bind(nonce.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn mark_pending_prefix(
    pool: &SqlitePool,
    url_prefix: &str,
    at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    // substr comparison instead of LIKE so '%' and '_' in URLs match literally
    let result = sqlx::query(
        r#"
        UPDATE live_connections
        SET pending_update_at = ?, pending_seq = pending_seq + 1
        WHERE expires_at IS NULL AND substr(url, 1, length(?)) = ?
        "#,
    )
    .bind(to_millis(at))
    .bind(url_prefix)
    .bind(url_prefix)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn mark_pending_nonce(
    pool: &SqlitePool,
    nonce: &Nonce,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE live_connections
        SET pending_update_at = ?, pending_seq = pending_seq + 1
        WHERE nonce = ? AND expires_at IS NULL
        "#,
    )
    .bind(to_millis(at))
    .bind(nonce.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn select_pending(
    pool: &SqlitePool,
    owner: &ProcessId,
) -> Result<Vec<PendingUpdate>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64, i64)>(
        r#"
        SELECT nonce, pending_update_at, pending_seq
        FROM live_connections
        WHERE owner_process = ? AND expires_at IS NULL AND pending_update_at IS NOT NULL
        ORDER BY pending_update_at ASC, nonce ASC
        "#,
    )
    .bind(owner.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(nonce, at, pending_seq)| {
            from_millis(at).map(|pending_update_at| PendingUpdate {
                nonce: stored_nonce(nonce),
                pending_update_at,
                pending_seq,
            })
        })
        .collect())
}

pub(crate) async fn clear_pending(
    pool: &SqlitePool,
    nonce: &Nonce,
    observed_seq: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE live_connections
        SET pending_update_at = NULL
        WHERE nonce = ? AND pending_seq = ? AND pending_update_at IS NOT NULL
        "#,
    )
    .bind(nonce.as_str())
    .bind(observed_seq)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn delete_expired(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<Nonce>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        DELETE FROM live_connections
        WHERE expires_at IS NOT NULL AND expires_at <= ?
        RETURNING nonce
        "#,
    )
    .bind(to_millis(now))
    .fetch_all(pool)
    .await?;

    let mut nonces: Vec<Nonce> = rows.into_iter().map(|(nonce,)| stored_nonce(nonce)).collect();
    nonces.sort();
    Ok(nonces)
}

pub(crate) async fn select_owned(
    pool: &SqlitePool,
    owner: &ProcessId,
) -> Result<Vec<Nonce>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT nonce
        FROM live_connections
        WHERE owner_process = ? AND expires_at IS NULL
        ORDER BY nonce ASC
        "#,
    )
    .bind(owner.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(nonce,)| stored_nonce(nonce)).collect())
}

pub(crate) async fn delete_owned(pool: &SqlitePool, owner: &ProcessId) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM live_connections WHERE owner_process = ?")
        .bind(owner.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM live_connections")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

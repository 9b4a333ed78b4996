/**
 * Connection Identity and Records
 *
 * This module defines the values that identify a live connection and the
 * row shape of the connection registry. These types are used by the server
 * (registry, connection table, long-poll handler) and by the client
 * (reconnector), so they live in the shared module.
 *
 * # Wire Headers
 *
 * - `Live-Connection: <nonce>` - attach or reattach a long-poll stream
 * - `Live-Connection-Abort: <nonce>` - best-effort release before navigating
 * - `Version: <version>` - server build identifier on every response
 *
 * A successful ordinary HTML response also carries `Live-Connection` with a
 * freshly registered nonce so the page can attach to it.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::error::SharedError;

/// Request/response header carrying a connection nonce
pub const LIVE_CONNECTION_HEADER: &str = "live-connection";

/// Request header asking the server to drop a connection
pub const LIVE_CONNECTION_ABORT_HEADER: &str = "live-connection-abort";

/// Response header carrying the server build identifier
pub const VERSION_HEADER: &str = "version";

/// Content type of the streaming response
pub const LIVE_STREAM_CONTENT_TYPE: &str = "application/x-ndjson; charset=utf-8";

/// Longest nonce accepted from a client
const MAX_NONCE_LEN: usize = 128;

/// Opaque per-connection token chosen by the client (or minted by the server
/// for a freshly rendered page).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Mint a fresh random nonce
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Validate a nonce received over the wire
    ///
    /// Nonces are restricted to ASCII alphanumerics, `-` and `_` so they can
    /// be echoed in headers and log fields without escaping.
    pub fn parse(value: &str) -> Result<Self, SharedError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SharedError::validation("nonce", "nonce must not be empty"));
        }
        if value.len() > MAX_NONCE_LEN {
            return Err(SharedError::validation(
                "nonce",
                format!("nonce longer than {} bytes", MAX_NONCE_LEN),
            ));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SharedError::validation(
                "nonce",
                "nonce may only contain ASCII letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a server process sharing the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    /// Process identifier for the given process index
    pub fn from_index(index: u16) -> Self {
        Self(format!("process-{}", index))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the connection registry
///
/// A row is *unattached* while `expires_at` is set (the page was rendered but
/// no stream has attached yet) and *attached* once `expires_at` is cleared and
/// `owner_process` names the process holding the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Connection nonce
    pub nonce: Nonce,
    /// Exact resource (path and query) this connection observes
    pub url: String,
    /// Grace-window deadline for unattached rows
    pub expires_at: Option<DateTime<Utc>>,
    /// Process currently holding the socket
    pub owner_process: Option<ProcessId>,
    /// Set when the owner must re-render and push
    pub pending_update_at: Option<DateTime<Utc>>,
}

impl ConnectionRecord {
    /// Whether a live socket is attached to this row
    pub fn is_attached(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Whether this unattached row is past its grace window
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}

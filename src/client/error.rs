/**
 * Client Error Types
 *
 * Errors raised while loading a page, holding its live stream, or applying
 * pushed payloads. The reconnector sorts them into permanent failures
 * (attach rejected, version skew) and transient ones that it retries.
 */

use crate::shared::SharedError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server refused the attach (422); retrying with this nonce is pointless
    #[error("Attach rejected: {body}")]
    AttachRejected { body: String },

    /// The server runs a different build than the one that rendered the page
    #[error("Server version {server:?} differs from page version {page:?}")]
    VersionSkew { page: String, server: String },

    /// Network failure
    #[error("Network error: {0}")]
    Transient(#[from] reqwest::Error),

    /// No byte arrived within the idle timeout
    #[error("No data for {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {0}")]
    UnexpectedStatus(u16),

    /// A stream line or page body that could not be decoded
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing response header {0}")]
    MissingHeader(&'static str),

    /// The attempt was cancelled
    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Shared(#[from] SharedError),
}

impl ClientError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    /// Whether the reconnector should try again with a fresh nonce
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_)
                | Self::Timeout(_)
                | Self::UnexpectedStatus(_)
                | Self::MalformedPayload(_)
                | Self::MissingHeader(_)
        )
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

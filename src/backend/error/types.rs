/**
 * Backend Error Types
 *
 * This module defines error types specific to the live-update server.
 * These errors are used by the long-poll middleware, the notifier and the
 * reaper, and can be converted to HTTP responses.
 *
 * # Error Categories
 *
 * ## Attach Rejections
 *
 * A `Live-Connection` request whose nonce is already attached, or registered
 * for a different URL, is rejected with `422 Unprocessable Entity`. The
 * client treats this as permanent and must not retry with the same nonce.
 *
 * ## Registry Errors
 *
 * Failures of the SQLite registry (busy database, I/O, migrations).
 *
 * ## Render Errors
 *
 * Failures while replaying a connection's request through the page pipeline.
 * These are logged per connection and never abort other connections.
 */

use crate::shared::{Nonce, SharedError};
use axum::http::StatusCode;
use thiserror::Error;

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use live_updates::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::handler(StatusCode::BAD_REQUEST, "Invalid request");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (e.g., malformed headers)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Attach refused for a nonce/URL mismatch or a duplicate attach
    #[error("Attach rejected for {nonce}: {reason}")]
    AttachRejected {
        /// Nonce the client tried to attach
        nonce: Nonce,
        /// Why the registry refused it
        reason: String,
    },

    /// Connection registry failure
    #[error("Registry error: {0}")]
    RegistryError(#[from] sqlx::Error),

    /// Registry migration failure
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// Re-render of a connection failed
    #[error("Render error: {message}")]
    RenderError {
        /// Human-readable error message
        message: String,
    },

    /// The socket for a connection is gone
    #[error("Connection {nonce} is closed")]
    ConnectionClosed {
        /// Nonce of the closed connection
        nonce: Nonce,
    },

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    /// Create a new attach rejection
    pub fn attach_rejected(nonce: Nonce, reason: impl Into<String>) -> Self {
        Self::AttachRejected {
            nonce,
            reason: reason.into(),
        }
    }

    /// Create a new render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::RenderError {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `HandlerError` - Uses the status code from the error
    /// - `AttachRejected` - 422 Unprocessable Entity
    /// - `SharedError` - 400 for validation, 500 otherwise
    /// - everything else - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::AttachRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SharedError(err) => match err {
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
                SharedError::SerializationError { .. } | SharedError::PayloadError { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::RegistryError(_)
            | Self::MigrationError(_)
            | Self::RenderError { .. }
            | Self::ConnectionClosed { .. }
            | Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::RenderError { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

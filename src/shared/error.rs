//! Shared Error Types
//!
//! This module defines error types that are shared between the server and the
//! client side of the live-update system. These errors represent failures that
//! can occur while handling the wire-level values both sides exchange: nonces,
//! process identifiers and newline-delimited payloads.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - A wire value failed validation (e.g. a malformed nonce)
//! - `PayloadError` - A streamed payload line could not be interpreted
//!
//! # Usage
//!
//! ```rust
//! use live_updates::shared::error::SharedError;
//!
//! let error = SharedError::validation("nonce", "nonce must not be empty");
//! assert!(error.to_string().contains("nonce"));
//! ```
use thiserror::Error;

/// Shared error types that can occur on both the server and the client
#[derive(Debug, Error, Clone)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// A streamed payload could not be interpreted
    #[error("Payload error: {message}")]
    PayloadError {
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new payload error
    pub fn payload(message: impl Into<String>) -> Self {
        Self::PayloadError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

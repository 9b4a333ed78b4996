//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the server and the client halves of the live-update system: connection
//! identity, wire header names, configuration, error types and jittered timer
//! ranges.
//!
//! # Overview
//!
//! The shared module is compiled for every build. Nothing in here touches a
//! socket or the registry; it only describes the values both sides agree on.

/// Connection identity, registry rows and wire header names
pub mod connection;

/// Shared error types
pub mod error;

/// Live-update configuration
pub mod config;

/// Jittered timer ranges
pub mod jitter;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, LiveConfig, LiveConfigBuilder};
pub use connection::{
    ConnectionRecord, Nonce, ProcessId, LIVE_CONNECTION_ABORT_HEADER, LIVE_CONNECTION_HEADER,
    LIVE_STREAM_CONTENT_TYPE, VERSION_HEADER,
};
pub use error::SharedError;
pub use jitter::JitterRange;

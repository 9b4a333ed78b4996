//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Single-process apps on an in-memory registry
//! - Multi-process clusters on a shared registry file
//! - Client event helpers

#[cfg(feature = "ssr")]
pub mod cluster;
pub mod events;

#[cfg(feature = "ssr")]
pub use cluster::*;
pub use events::*;

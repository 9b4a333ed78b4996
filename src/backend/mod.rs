//! Backend Module
//!
//! Server side of live updates: every open page holds a long-poll stream,
//! and any process that changes data can get every affected page
//! re-rendered and pushed, even when the stream is held by another process.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`registry`** - SQLite connection registry shared by all processes
//! - **`live`** - Per-process connection table, streams, notifier, reaper
//! - **`middleware`** - Long-poll attach/abort and nonce registration
//! - **`routes`** - Public and loopback control routers
//! - **`pages`** - Demo discussion pages the live layer wraps
//! - **`server`** - Initialization, state, configuration, supervisor
//! - **`error`** - Backend error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── registry/       - Connection registry
//! ├── live/           - Live connection machinery
//! ├── middleware/     - Request middleware
//! ├── routes/         - Route configuration
//! ├── pages/          - Demo pages
//! ├── server/         - Server initialization and state
//! └── error/          - Error types
//! ```
//!
//! # Processes
//!
//! Processes share nothing but the registry database and loopback control
//! pings. A socket is only ever written by the process whose table holds it;
//! other processes reach it by marking its row pending and pinging.

/// Backend error types
#[cfg(feature = "ssr")]
pub mod error;

/// Connection registry
#[cfg(feature = "ssr")]
pub mod registry;

/// Live connection machinery
#[cfg(feature = "ssr")]
pub mod live;

/// Middleware for request processing
#[cfg(feature = "ssr")]
pub mod middleware;

/// Route configuration
#[cfg(feature = "ssr")]
pub mod routes;

/// Demo pages
#[cfg(feature = "ssr")]
pub mod pages;

/// Server setup and configuration
#[cfg(feature = "ssr")]
pub mod server;

/// Re-export commonly used types
#[cfg(feature = "ssr")]
pub use error::BackendError;
#[cfg(feature = "ssr")]
pub use live::LiveState;
#[cfg(feature = "ssr")]
pub use registry::ConnectionRegistry;
#[cfg(feature = "ssr")]
pub use server::create_app;

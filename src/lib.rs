// Increase recursion limit for complex async operations
#![recursion_limit = "256"]

//! Live Updates - Main Library
//!
//! Server-pushed live updates for server-rendered pages. Every open page
//! holds a long-lived streaming request; whenever data changes, the server
//! re-renders every affected page in full and pushes it down that stream,
//! and the client morphs its live document into the new one without
//! disturbing what the user is doing.
//!
//! # Module Structure
//!
//! - **`shared`** - Types both halves agree on
//!   - Nonces, process ids, registry records, header names
//!   - Configuration and jitter ranges
//!   - Error types
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - SQLite connection registry shared across processes
//!   - Long-poll middleware, connection table, streaming bodies
//!   - Notifier with loopback sibling pings, reaper
//!   - Demo discussion pages and the multi-process server binary
//!
//! - **`client`** - Page-side code
//!   - Document model and HTML parser
//!   - Keyed morph engine
//!   - Reconnecting stream reader
//!
//! # Feature Flags
//!
//! - **`ssr`** - Server-side code (enables the backend module)
//!
//! # Usage
//!
//! ## Server-Side
//!
//! ```rust,no_run
//! use live_updates::backend::server::init::create_app;
//! use live_updates::shared::LiveConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = create_app(LiveConfig::from_env()?).await?;
//! let public = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! let control = tokio::net::TcpListener::bind("127.0.0.1:4000").await?;
//! server.serve(public, control).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Changing Data
//!
//! Anything that writes data the pages render calls `notify_changed` with
//! a URL prefix; every connection whose URL starts with it gets a fresh
//! render, whichever process holds it.
//!
//! ```rust,no_run
//! # async fn example(live: live_updates::backend::LiveState) -> Result<(), live_updates::backend::BackendError> {
//! live.notify_changed("/topics/5").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `SharedError` and `ConfigError` in `shared`
//! - `BackendError` in `backend::error`, answering with a JSON body
//! - `ClientError` in `client::error`

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// Page-side live update client
pub mod client;

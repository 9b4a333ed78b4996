//! Middleware Module
//!
//! HTTP middleware for the page server.
//!
//! - **`live_connection`** - Long-poll attach/abort handling and nonce registration
//!
//! # Example
//!
//! ```rust,no_run
//! use live_updates::backend::middleware::live_connection_middleware;
//!
//! // let app = pages.layer(axum::middleware::from_fn_with_state(live, live_connection_middleware));
//! ```

pub mod live_connection;

pub use live_connection::{live_connection_middleware, request_url};

//! Client Module
//!
//! The page-side half of live updates, written against a small document
//! model instead of a browser DOM.
//!
//! # Architecture
//!
//! - **`dom`** - Owned node tree, arena document, HTML parser
//! - **`morph`** - Keyed diff and in-place reconciliation
//! - **`page`** - A loaded page and the payload sink trait
//! - **`reconnector`** - Holds the live stream open and applies pushes
//! - **`error`** - Client error types
//!
//! # Usage
//!
//! ```rust,no_run
//! use live_updates::client::{LivePage, Reconnector, ReconnectorConfig};
//! use live_updates::shared::Nonce;
//! use std::sync::{Arc, Mutex};
//!
//! # async fn example() -> Result<(), live_updates::client::ClientError> {
//! let http = reqwest::Client::new();
//! let page = LivePage::load(&http, "http://127.0.0.1:3000", "/topics/1").await?;
//! let config = ReconnectorConfig::for_page("http://127.0.0.1:3000", &page);
//! let nonce = page.nonce().cloned().unwrap_or_else(Nonce::generate);
//!
//! let (reconnector, handle, mut events) =
//!     Reconnector::new(config, http, Arc::new(Mutex::new(page)), nonce);
//! tokio::spawn(reconnector.run());
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! handle.close();
//! # Ok(())
//! # }
//! ```

pub mod dom;
pub mod error;
pub mod morph;
pub mod page;
pub mod reconnector;

pub use error::ClientError;
pub use morph::{morph, MorphOptions, MorphStats};
pub use page::{LivePage, PayloadSink};
pub use reconnector::{
    ClientEvent, Notice, Phase, Reconnector, ReconnectorConfig, ReconnectorExit, ReconnectorHandle,
};

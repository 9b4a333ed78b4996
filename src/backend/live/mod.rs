//! Live Connections
//!
//! Per-process machinery for held long-poll connections.
//!
//! # Module Structure
//!
//! ```text
//! live/
//! ├── mod.rs        - Module exports
//! ├── state.rs      - LiveState: config, registry, table, renderer, wake signal
//! ├── table.rs      - ConnectionTable: nonce → socket handle for this process
//! ├── render.rs     - Renderer seam and request replay
//! ├── stream.rs     - NDJSON stream body and response headers
//! ├── connection.rs - Open/close/abort, heartbeat and forced refresh tasks
//! ├── notifier.rs   - notify_changed, sibling pings, drain worker
//! └── reaper.rs     - Expiry sweep and zombie cross-check
//! ```
//!
//! # Flow
//!
//! ```text
//! notify_changed(prefix) ─► registry: mark pending ─► debounce ─► POST /live-updates (siblings)
//!                                                                     │
//!             drain worker ◄── wake ◄─────────────────────────────────┘
//!                 │
//!                 └─► re-render page ─► write NDJSON line ─► clear pending (if unchanged)
//! ```

pub mod connection;
pub mod notifier;
pub mod reaper;
pub mod render;
pub mod state;
pub mod stream;
pub mod table;

pub use notifier::DrainReport;
pub use reaper::ZombieSweep;
pub use render::{LiveContext, Renderer, RequestTemplate, RouterRenderer};
pub use state::LiveState;
pub use table::{ConnectionHandle, ConnectionTable};

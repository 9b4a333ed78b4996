//! Server Module
//!
//! Initialization and configuration of one live-update process.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs        - Module exports and documentation
//! ├── state.rs      - AppState and FromRef implementations
//! ├── config.rs     - Configuration and registry loading
//! ├── init.rs       - Process creation and serving
//! └── supervisor.rs - Multi-process launcher
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration Loading**: `.env`, `LIVE_CONFIG` TOML, `LIVE_*` variables
//! 2. **Registry**: open SQLite, run migrations
//! 3. **Hygiene**: release rows left by a previous run of this process
//! 4. **Routers**: public pages behind the live middleware, loopback control
//! 5. **Background Tasks**: drain worker, expiry reaper (process 0), zombie check
//!
//! # Example
//!
//! ```rust,no_run
//! use live_updates::backend::server::create_app;
//! use live_updates::shared::LiveConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LiveConfig::from_env()?;
//! let server = create_app(config).await?;
//! let public = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
//! let control = tokio::net::TcpListener::bind("127.0.0.1:6000").await?;
//! server.serve(public, control).await?;
//! # Ok(())
//! # }
//! ```

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

/// Multi-process launcher
pub mod supervisor;

pub use init::{create_app, create_app_with_registry, LiveServer};
pub use state::AppState;

//! Route Configuration Module
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs     - Module exports and documentation
//! ├── router.rs  - Public and control router assembly
//! └── control.rs - POST /live-updates ping handler
//! ```
//!
//! # Routes
//!
//! Public (per process, `http_port_base + index`):
//! - `GET /`, `GET /topics/{id}`, `POST /topics/{id}/posts` behind the
//!   live connection middleware
//!
//! Control (loopback, `control_port_base + index`):
//! - `POST /live-updates` - sibling ping, answers 204

/// Router assembly
pub mod router;

/// Control endpoint handler
pub mod control;

pub use router::{create_control_router, create_router};

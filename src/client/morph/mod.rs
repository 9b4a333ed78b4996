//! Morphing
//!
//! Reconciles a live document with a freshly rendered one.
//!
//! # Module Structure
//!
//! ```text
//! morph/
//! ├── mod.rs    - Module exports
//! ├── diff.rs   - Myers diff producing replace hunks
//! └── engine.rs - Keyed child reconciliation, attribute sync, move pool
//! ```

pub mod diff;
pub mod engine;

pub use diff::{diff, DiffUnit};
pub use engine::{morph, MorphOptions, MorphStats, NodeKey, RemoveGuard};

//! Property-based tests
//!
//! - `morph_proptest` - convergence, idempotence and keyed identity
//! - `diff_proptest` - diff hunks are a minimal edit script

pub mod diff_proptest;
pub mod morph_proptest;

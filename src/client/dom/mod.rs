//! Page Model
//!
//! Just enough of a DOM for the client to hold a live page and morph it.
//!
//! # Module Structure
//!
//! ```text
//! dom/
//! ├── mod.rs      - Module exports
//! ├── node.rs     - Owned Node/Element tree and serialization
//! ├── document.rs - Arena Document with stable NodeIds and focus
//! └── parse.rs    - Tolerant HTML parser
//! ```

pub mod document;
pub mod node;
pub mod parse;

pub use document::{Document, NodeData, NodeId};
pub use node::{Element, Node, KEY_ATTRIBUTE};
pub use parse::{parse_document, parse_fragment};

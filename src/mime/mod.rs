//! MIME structure interpretation.
//!
//! The low-level grammar is handled by `mail-parser`; this module turns its
//! object graph into an owned [`node::ContentNode`] tree and decodes leaf
//! bodies for display.

pub mod builder;
pub mod classify;
pub mod filter;
pub mod header;
pub mod node;
pub mod partial;
pub mod pipeline;

pub use builder::TreeBuilder;
pub use classify::ContentTypeClassifier;
pub use node::{ContentNode, NodeId, NodeKind, Variant};

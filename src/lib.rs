//! `mimeview`: MIME content-tree decoding and viewable-text composition
//! for mail readers.
//!
//! A raw message is parsed with `mail-parser`, turned into an owned tree of
//! typed content nodes, and then flattened on demand: the body text with
//! alternatives resolved, the attachment list, and any embedded messages.

pub mod actions;
pub mod config;
pub mod error;
pub mod message;
pub mod mime;
pub mod model;
pub mod store;

pub use error::{MimeError, Result};
pub use message::{Message, MessageThread, RenderMode};

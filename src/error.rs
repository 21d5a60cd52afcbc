//! Centralized error types for mimeview.

use std::path::PathBuf;
use thiserror::Error;

use crate::mime::node::{NodeId, Variant};

/// All errors produced by the mimeview library.
#[derive(Error, Debug)]
pub enum MimeError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified message file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The raw bytes could not be parsed as a mail message at all.
    #[error("Could not parse message: {0}")]
    Unparseable(String),

    /// The decoding pipeline was asked to decode a part it cannot render.
    #[error("Part {id} ({content_type}) cannot be decoded for display")]
    UnsupportedContent { id: NodeId, content_type: String },

    /// A leaf-only operation was requested on a structural node.
    #[error("Operation '{operation}' is not supported on {variant:?} node {id}")]
    UnsupportedOperation {
        id: NodeId,
        variant: Variant,
        operation: &'static str,
    },

    /// No node with this id exists in the tree that was searched.
    #[error("No content node with id {0}")]
    NodeNotFound(NodeId),

    /// A fragmented `message/partial` could not be reassembled.
    #[error("Could not reconstruct partial message '{partial_id}': {reason}")]
    Reconstruction { partial_id: String, reason: String },

    /// HTML output and the HTML fallback path were both requested.
    #[error("HTML output and HTML fallback are mutually exclusive")]
    ConflictingRenderFlags,

    /// A store operation was requested on a message the store does not know.
    #[error("Message is not backed by the mail store: {0}")]
    NotInStore(String),

    /// The mail-store collaborator failed.
    #[error("Mail store error: {0}")]
    Store(String),
}

/// Convenience alias for `Result<T, MimeError>`.
pub type Result<T> = std::result::Result<T, MimeError>;

impl MimeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors that prevent a message from being loaded at all.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::FileNotFound(_) | Self::Unparseable(_)
        )
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `MimeError`
/// when no path context is available (rare, prefer `MimeError::io`).
impl From<std::io::Error> for MimeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

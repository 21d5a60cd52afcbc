//! Attachment descriptors handed to the UI layer.
//!
//! Descriptors are snapshots taken from leaf nodes of a message's content
//! tree. The decoded payload is produced on request via [`Attachment::contents`].

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{MimeError, Result};
use crate::mime::node::{ContentNode, NodeId};

/// Longest file name written by [`Attachment::save_in`].
const MAX_FILENAME_LEN: usize = 150;

/// Metadata about one attachment leaf.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    /// Id of the content node this descriptor was taken from.
    pub id: NodeId,

    /// Filename from `Content-Disposition` or `Content-Type; name=`. Empty if neither is set.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Transfer-decoded size in bytes.
    pub size: u64,

    /// Content-ID for inline parts referenced from HTML.
    pub content_id: Option<String>,

    /// `true` when the part was declared `Content-Disposition: inline`.
    pub is_inline: bool,
}

impl Attachment {
    /// Describe a leaf node. Structural nodes have no attachment payload.
    pub fn from_node(node: &ContentNode) -> Result<Self> {
        let size = node.file_size()?;
        Ok(Self {
            id: node.id(),
            filename: node.filename().unwrap_or_default().to_string(),
            content_type: node.content_type().essence(),
            size: size as u64,
            content_id: node.content_id().map(String::from),
            is_inline: node
                .disposition()
                .is_some_and(|d| d.eq_ignore_ascii_case("inline")),
        })
    }

    /// Decode the payload of the node this descriptor was taken from.
    pub fn contents(&self, root: &ContentNode) -> Result<Vec<u8>> {
        match root.find_by_id(self.id) {
            Some(node) => node.raw_contents(),
            None => Err(MimeError::NodeNotFound(self.id)),
        }
    }

    /// File name to save under: the declared name made safe, or `part-<id>`.
    pub fn save_name(&self) -> String {
        let name = Path::new(&self.filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.is_empty() {
            format!("part-{}", self.id)
        } else {
            sanitize_filename(name, MAX_FILENAME_LEN)
        }
    }

    /// Write the decoded payload into `dir`, never overwriting an existing file.
    pub fn save_in(&self, root: &ContentNode, dir: &Path) -> Result<PathBuf> {
        let data = self.contents(root)?;
        let path = unique_path(&dir.join(self.save_name()));
        std::fs::write(&path, &data).map_err(|e| MimeError::io(&path, e))?;
        info!(path = %path.display(), bytes = data.len(), "Saved attachment");
        Ok(path)
    }
}

/// Keep alphanumerics and `-._@`; everything else becomes `_`.
pub fn sanitize_filename(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// `path`, or `stem_N.ext` for the first N that does not exist yet.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let candidate = |i: u32| {
        if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        }
    };
    (1..1000)
        .map(candidate)
        .find(|p| !p.exists())
        .unwrap_or_else(|| parent.join(format!("{stem}_dup.{ext}")))
}

//! The owned content-node tree.
//!
//! Every node gets a process-wide unique [`NodeId`] when it is built.
//! Alternative representations refer to each other by id, so the tree
//! itself stays strictly owned (parent → children) with no cycles.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::{MimeError, Result};
use crate::mime::filter::transfer::TransferEncoding;
use crate::model::content_type::ContentType;

/// Identifier of a content node.
///
/// Ids come from a single counter that starts at zero when the process
/// starts and is never reset. They are unique within the process but are
/// not stable across runs, so they must not be persisted.
pub type NodeId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_id() -> NodeId {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Structural variant of a node, decided once when the node is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Variant {
    /// A part without substructure.
    Leaf,
    /// A part wrapping a complete message (`message/rfc822`).
    EmbeddedMessage,
    /// A reassembled `message/partial`.
    PartialMessage,
    /// An ordered group of parts.
    Multipart,
    /// A message with no body structure at all.
    TopLevelMessage,
}

/// Payload of a leaf part.
#[derive(Debug, Clone, Default)]
pub struct LeafPart {
    /// Body bytes as they appear in the message (still transfer-encoded).
    pub body: Vec<u8>,
    pub transfer_encoding: TransferEncoding,
    /// `Content-Disposition` type, lowercase.
    pub disposition: Option<String>,
    pub filename: Option<String>,
    pub content_id: Option<String>,
    pub viewable: bool,
    /// Set when this leaf stands in for a subtree that could not be built.
    pub fault: Option<String>,
}

/// Variant-specific data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Leaf(LeafPart),
    /// Wraps a `TopLevelMessage` child holding the transfer-decoded inner message.
    EmbeddedMessage,
    /// Wraps a `TopLevelMessage` child holding the reassembled message.
    PartialMessage { partial_id: String },
    Multipart,
    /// A complete message, kept as raw bytes. Always terminal.
    TopLevelMessage { raw: Vec<u8> },
}

impl NodeKind {
    pub fn variant(&self) -> Variant {
        match self {
            NodeKind::Leaf(_) => Variant::Leaf,
            NodeKind::EmbeddedMessage => Variant::EmbeddedMessage,
            NodeKind::PartialMessage { .. } => Variant::PartialMessage,
            NodeKind::Multipart => Variant::Multipart,
            NodeKind::TopLevelMessage { .. } => Variant::TopLevelMessage,
        }
    }
}

/// One node of a message's content tree.
#[derive(Debug, Clone)]
pub struct ContentNode {
    id: NodeId,
    content_type: ContentType,
    kind: NodeKind,
    preferred: bool,
    siblings: Vec<NodeId>,
    children: Vec<ContentNode>,
}

impl ContentNode {
    pub(crate) fn new(id: NodeId, content_type: ContentType, kind: NodeKind) -> Self {
        Self {
            id,
            content_type,
            kind,
            preferred: false,
            siblings: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A non-viewable leaf standing in for content that could not be built.
    pub(crate) fn placeholder(id: NodeId, content_type: ContentType, fault: String) -> Self {
        Self::new(
            id,
            content_type,
            NodeKind::Leaf(LeafPart {
                fault: Some(fault),
                ..LeafPart::default()
            }),
        )
    }

    pub(crate) fn push_child(&mut self, child: ContentNode) {
        self.children.push(child);
    }

    pub(crate) fn children_mut(&mut self) -> &mut [ContentNode] {
        &mut self.children
    }

    pub(crate) fn set_preferred(&mut self, preferred: bool) {
        self.preferred = preferred;
    }

    pub(crate) fn set_siblings(&mut self, siblings: Vec<NodeId>) {
        self.siblings = siblings;
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn variant(&self) -> Variant {
        self.kind.variant()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    fn leaf(&self) -> Option<&LeafPart> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Only leaves can be viewable.
    pub fn is_viewable(&self) -> bool {
        self.leaf().is_some_and(|l| l.viewable)
    }

    /// A leaf that is not viewable. Structural nodes are never attachments.
    pub fn is_attachment(&self) -> bool {
        self.leaf().is_some_and(|l| !l.viewable)
    }

    /// Chosen representation inside a `multipart/alternative` group.
    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    /// Ids of the other members of this node's alternative group.
    pub fn siblings(&self) -> &[NodeId] {
        &self.siblings
    }

    pub fn children(&self) -> &[ContentNode] {
        &self.children
    }

    pub fn filename(&self) -> Option<&str> {
        self.leaf().and_then(|l| l.filename.as_deref())
    }

    pub fn content_id(&self) -> Option<&str> {
        self.leaf().and_then(|l| l.content_id.as_deref())
    }

    pub fn disposition(&self) -> Option<&str> {
        self.leaf().and_then(|l| l.disposition.as_deref())
    }

    /// Why this leaf replaced the content it stands for, if it did.
    pub fn fault(&self) -> Option<&str> {
        self.leaf().and_then(|l| l.fault.as_deref())
    }

    pub fn is_degraded(&self) -> bool {
        self.fault().is_some()
    }

    /// Bytes of the wrapped message for message nodes and their wrappers.
    pub fn message_bytes(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::TopLevelMessage { raw } => Some(raw),
            NodeKind::EmbeddedMessage | NodeKind::PartialMessage { .. } => {
                self.children.first().and_then(ContentNode::message_bytes)
            }
            _ => None,
        }
    }

    // ── Traversal ──────────────────────────────────────────────

    /// Pre-order, left-to-right iterator over this node and its descendants.
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    pub fn find_by_id(&self, id: NodeId) -> Option<&ContentNode> {
        self.iter().find(|node| node.id == id)
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    // ── Payload ────────────────────────────────────────────────

    /// Transfer-decoded body of a leaf. No charset or HTML conversion.
    pub fn raw_contents(&self) -> Result<Vec<u8>> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Ok(leaf.transfer_encoding.decode(&leaf.body)),
            _ => Err(MimeError::UnsupportedOperation {
                id: self.id,
                variant: self.variant(),
                operation: "raw_contents",
            }),
        }
    }

    /// Size of [`raw_contents`](Self::raw_contents) in bytes.
    pub fn file_size(&self) -> Result<usize> {
        self.raw_contents().map(|bytes| bytes.len())
    }

    /// A serializable outline of this subtree.
    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            id: self.id,
            variant: self.variant(),
            content_type: self.content_type.essence(),
            viewable: self.is_viewable(),
            attachment: self.is_attachment(),
            preferred: self.preferred,
            siblings: self.siblings.clone(),
            filename: self.filename().map(String::from),
            size: self.file_size().ok(),
            fault: self.fault().map(String::from),
            children: self.children.iter().map(ContentNode::summary).collect(),
        }
    }
}

/// Pre-order iterator returned by [`ContentNode::iter`].
pub struct Iter<'a> {
    stack: Vec<&'a ContentNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ContentNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Outline of a node for display and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub variant: Variant,
    pub content_type: String,
    pub viewable: bool,
    pub attachment: bool,
    pub preferred: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub siblings: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSummary>,
}

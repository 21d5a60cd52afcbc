//! Builds a [`ContentNode`] tree from a parsed `mail-parser` message.
//!
//! The builder takes a single read-only pass over the parser's object graph
//! and copies out what the tree needs, so the result owns all of its data.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::mime::classify::ContentTypeClassifier;
use crate::mime::filter::transfer::TransferEncoding;
use crate::mime::node::{next_id, ContentNode, LeafPart, NodeId, NodeKind};
use crate::mime::partial::{Fragment, FragmentPool};
use crate::model::content_type::ContentType;

/// Turns parsed messages into content trees.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    classifier: ContentTypeClassifier,
    max_depth: usize,
    cite_color: u32,
    fragments: FragmentPool,
}

impl TreeBuilder {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            classifier: ContentTypeClassifier::from_config(config),
            max_depth: config.max_depth,
            cite_color: config.cite_color,
            fragments: FragmentPool::default(),
        }
    }

    /// Use these fragments when reassembling `message/partial` parts.
    pub fn with_fragments(mut self, fragments: FragmentPool) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn classifier(&self) -> &ContentTypeClassifier {
        &self.classifier
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Cite color for messages loaded with this builder.
    pub fn cite_color(&self) -> u32 {
        self.cite_color
    }

    /// Build the tree for a whole message. Never fails: content that cannot
    /// be interpreted becomes a non-viewable leaf.
    pub fn build_message(&self, message: &Message<'_>) -> ContentNode {
        self.build_root(message, 0)
    }

    fn build_root(&self, message: &Message<'_>, depth: usize) -> ContentNode {
        match message.parts.first() {
            Some(root) => self.build_part(message, root, depth),
            None => self.build_top_level(message.raw_message.to_vec(), depth),
        }
    }

    /// A terminal node owning a complete message. Its body is reached by
    /// loading those bytes as a message of their own.
    fn build_top_level(&self, raw: Vec<u8>, depth: usize) -> ContentNode {
        let node = ContentNode::new(
            next_id(),
            ContentType::new("message", "rfc822"),
            NodeKind::TopLevelMessage { raw },
        );
        log_node(&node, depth);
        node
    }

    fn build_part(&self, message: &Message<'_>, part: &MessagePart<'_>, depth: usize) -> ContentNode {
        // Parents take their id before any child.
        let id = next_id();
        let content_type = part
            .content_type()
            .map(ContentType::from)
            .unwrap_or_default();

        let node = if depth > self.max_depth {
            warn!(id, depth, max_depth = self.max_depth, "Content nested too deeply");
            ContentNode::placeholder(
                id,
                content_type,
                format!("nesting deeper than {} levels", self.max_depth),
            )
        } else if content_type.is_type("message", "partial") {
            self.build_partial(id, content_type, message, part, depth)
        } else {
            match &part.body {
                PartType::Text(_)
                | PartType::Html(_)
                | PartType::Binary(_)
                | PartType::InlineBinary(_) => self.build_leaf(id, content_type, message, part),
                PartType::Message(inner) => {
                    let mut raw = transfer_decoded_body(message, part);
                    if raw.is_empty() {
                        raw = inner.raw_message.to_vec();
                    }
                    self.build_embedded(id, content_type, raw, depth)
                }
                PartType::Multipart(part_ids) => {
                    self.build_multipart(id, content_type, message, part_ids, depth)
                }
            }
        };

        log_node(&node, depth);
        node
    }

    fn build_leaf(
        &self,
        id: NodeId,
        content_type: ContentType,
        message: &Message<'_>,
        part: &MessagePart<'_>,
    ) -> ContentNode {
        let disposition = part
            .content_disposition()
            .map(|d| d.ctype().to_ascii_lowercase());
        let viewable = self
            .classifier
            .is_viewable(Some(&content_type), disposition.as_deref());

        let leaf = LeafPart {
            body: part_body(message, part).to_vec(),
            transfer_encoding: TransferEncoding::from_header(part.content_transfer_encoding()),
            disposition,
            filename: part.attachment_name().map(String::from),
            content_id: part
                .content_id()
                .map(|cid| cid.trim().trim_start_matches('<').trim_end_matches('>').to_string()),
            viewable,
            fault: None,
        };
        ContentNode::new(id, content_type, NodeKind::Leaf(leaf))
    }

    /// The single child is a terminal node holding the inner message.
    fn build_embedded(&self, id: NodeId, content_type: ContentType, raw: Vec<u8>, depth: usize) -> ContentNode {
        if MessageParser::default().parse(&raw).is_none() {
            warn!(id, "Embedded message could not be parsed");
            return degraded(id, content_type, raw, "embedded message is unparseable".into());
        }

        let mut node = ContentNode::new(id, content_type, NodeKind::EmbeddedMessage);
        node.push_child(self.build_top_level(raw, depth + 1));
        node
    }

    fn build_partial(
        &self,
        id: NodeId,
        content_type: ContentType,
        message: &Message<'_>,
        part: &MessagePart<'_>,
        depth: usize,
    ) -> ContentNode {
        let body = transfer_decoded_body(message, part);
        let Some(fragment) = Fragment::from_content_type(&content_type, body.clone()) else {
            warn!(id, "message/partial without id or number");
            return degraded(id, content_type, body, "fragment has no id or number".into());
        };

        let raw = match self.fragments.reassemble(&fragment) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(id, error = %e, "Partial message not reconstructed");
                return degraded(id, content_type, body, e.to_string());
            }
        };

        if MessageParser::default().parse(&raw).is_none() {
            warn!(id, partial_id = %fragment.id, "Reassembled message is unparseable");
            return degraded(id, content_type, body, "reassembled message is unparseable".into());
        }

        let mut node = ContentNode::new(
            id,
            content_type,
            NodeKind::PartialMessage {
                partial_id: fragment.id,
            },
        );
        node.push_child(self.build_top_level(raw, depth + 1));
        node
    }

    fn build_multipart(
        &self,
        id: NodeId,
        content_type: ContentType,
        message: &Message<'_>,
        part_ids: &[usize],
        depth: usize,
    ) -> ContentNode {
        let mut node = ContentNode::new(id, content_type, NodeKind::Multipart);
        for part in part_ids.iter().filter_map(|&i| message.parts.get(i)) {
            node.push_child(self.build_part(message, part, depth + 1));
        }

        if node.content_type().is_type("multipart", "alternative") {
            self.link_alternatives(&mut node);
        }
        node
    }

    /// Every child of an alternative group is a sibling of every other
    /// child; those matching the preferred type are marked preferred.
    fn link_alternatives(&self, node: &mut ContentNode) {
        let ids: Vec<NodeId> = node.children().iter().map(ContentNode::id).collect();
        for child in node.children_mut() {
            let own = child.id();
            child.set_siblings(ids.iter().copied().filter(|&id| id != own).collect());
            let preferred = self.classifier.is_preferred(child.content_type());
            child.set_preferred(preferred);
            debug!(id = own, preferred, "Linked alternative");
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(&RenderConfig::default())
    }
}

/// A non-viewable leaf keeping the original body, marked with `fault`.
fn degraded(id: NodeId, content_type: ContentType, body: Vec<u8>, fault: String) -> ContentNode {
    ContentNode::new(
        id,
        content_type,
        NodeKind::Leaf(LeafPart {
            body,
            fault: Some(fault),
            ..LeafPart::default()
        }),
    )
}

fn part_body<'a>(message: &'a Message<'_>, part: &MessagePart<'_>) -> &'a [u8] {
    message
        .raw_message
        .get(part.raw_body_offset()..part.raw_end_offset())
        .unwrap_or_default()
}

fn transfer_decoded_body(message: &Message<'_>, part: &MessagePart<'_>) -> Vec<u8> {
    TransferEncoding::from_header(part.content_transfer_encoding()).decode(part_body(message, part))
}

fn log_node(node: &ContentNode, depth: usize) {
    debug!(
        id = node.id(),
        variant = ?node.variant(),
        content_type = %node.content_type().essence(),
        viewable = node.is_viewable(),
        depth,
        "Built content node"
    );
}

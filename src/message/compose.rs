//! Viewable-text composition with alternative resolution.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::RenderConfig;
use crate::error::{MimeError, Result};
use crate::mime::node::{ContentNode, NodeId};
use crate::mime::pipeline;

/// Appended in place of a part that reached the decoder but cannot be decoded.
pub const NON_VIEWABLE_PLACEHOLDER: &str = "Error: Non-viewable part!";

/// How the body should be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// Decoded text as-is; the preferred alternative wins.
    #[default]
    Text,
    /// HTML output; plain-text parts are converted to HTML.
    Html,
    /// Uniform HTML display of the plain alternative, escaped through the
    /// text-to-HTML path instead of using the HTML part.
    HtmlFallback,
}

impl RenderMode {
    /// Combine the two independent request flags. Asking for both is an error.
    pub fn from_flags(want_html: bool, want_html_fallback: bool) -> Result<Self> {
        match (want_html, want_html_fallback) {
            (true, true) => Err(MimeError::ConflictingRenderFlags),
            (true, false) => Ok(Self::Html),
            (false, true) => Ok(Self::HtmlFallback),
            (false, false) => Ok(Self::Text),
        }
    }

    /// Whether `text/plain` goes through the HTML conversion stage.
    pub fn converts_plain_text(self) -> bool {
        matches!(self, Self::Html | Self::HtmlFallback)
    }
}

/// Walks a content tree and accumulates the text of every selected viewable leaf.
#[derive(Debug, Clone)]
pub struct TextComposer {
    cite_color: u32,
}

impl TextComposer {
    pub fn new(cite_color: u32) -> Self {
        Self { cite_color }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.cite_color)
    }

    /// Pre-order, left to right. Exactly one member of each alternative
    /// group is visited; the others are skipped with their whole subtree.
    pub fn compose(&self, root: &ContentNode, mode: RenderMode) -> String {
        let mut out = String::new();
        self.visit(root, mode, &mut out);
        out
    }

    fn visit(&self, node: &ContentNode, mode: RenderMode, out: &mut String) {
        if node.is_viewable() {
            self.append(node, mode, out);
        }

        let selected = select_alternative(node.children(), mode);
        for child in node.children() {
            if child.siblings().is_empty() || Some(child.id()) == selected {
                self.visit(child, mode, out);
            }
        }
    }

    fn append(&self, node: &ContentNode, mode: RenderMode, out: &mut String) {
        match pipeline::decode(node, mode.converts_plain_text(), self.cite_color) {
            Ok(text) => out.push_str(&text),
            Err(e) => {
                error!(id = node.id(), error = %e, "Viewable part could not be decoded");
                out.push_str(NON_VIEWABLE_PLACEHOLDER);
            }
        }
    }
}

impl Default for TextComposer {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// The member of an alternative group to render, among `children` that have siblings.
///
/// `Text` and `Html` take the first preferred member, `HtmlFallback` the
/// first non-preferred one. Either falls back to the first member.
pub fn select_alternative(children: &[ContentNode], mode: RenderMode) -> Option<NodeId> {
    let mut group = children.iter().filter(|c| !c.siblings().is_empty());
    let first = group.clone().next()?;
    let wanted = match mode {
        RenderMode::Text | RenderMode::Html => group.find(|c| c.is_preferred()),
        RenderMode::HtmlFallback => group.find(|c| !c.is_preferred()),
    };
    Some(wanted.unwrap_or(first).id())
}

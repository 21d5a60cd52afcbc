//! Messages: a header block plus one content tree, and the operations the
//! UI layer consumes (viewable text, attachments, embedded messages).

pub mod compose;
pub mod thread;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use mail_parser::MessageParser;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{MimeError, Result};
use crate::mime::builder::TreeBuilder;
use crate::mime::header::MessageHeaders;
use crate::mime::node::{ContentNode, NodeId, Variant};
use crate::model::attachment::Attachment;
use crate::store::{self, MailStore};

pub use compose::{RenderMode, TextComposer, NON_VIEWABLE_PLACEHOLDER};
pub use thread::MessageThread;

static PATCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[PATCH.*\]").expect("patch pattern is valid"));

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z.\-]").expect("filename pattern is valid"));

/// Where a message's bytes came from. Decides how [`Message::save_to`] works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Loaded from a file on disk.
    File(PathBuf),
    /// Built from bytes in memory (e.g. an embedded message).
    Memory,
    /// Looked up in the mail store by id.
    Store { message_id: String, path: PathBuf },
}

impl Source {
    /// The backing file, if there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Source::File(path) | Source::Store { path, .. } => Some(path),
            Source::Memory => None,
        }
    }
}

/// A decoded message.
#[derive(Debug, Clone)]
pub struct Message {
    raw: Vec<u8>,
    headers: MessageHeaders,
    root: ContentNode,
    tags: BTreeSet<String>,
    source: Source,
    builder: TreeBuilder,
}

impl Message {
    /// Load a `.eml` file (or a single mbox entry) from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(path, &TreeBuilder::default())
    }

    pub fn from_file_with(path: impl AsRef<Path>, builder: &TreeBuilder) -> Result<Self> {
        let path = path.as_ref();
        let data = read_file(path)?;
        info!(path = %path.display(), bytes = data.len(), "Loading message");
        Self::build(data, Source::File(path.to_path_buf()), builder)
    }

    /// Build a message from bytes held in memory.
    pub fn from_bytes(raw: impl Into<Vec<u8>>) -> Result<Self> {
        Self::from_bytes_with(raw, &TreeBuilder::default())
    }

    pub fn from_bytes_with(raw: impl Into<Vec<u8>>, builder: &TreeBuilder) -> Result<Self> {
        Self::build(raw.into(), Source::Memory, builder)
    }

    /// Look a message up in the store, load its file, then its tags.
    pub fn from_store(
        store: &Mutex<dyn MailStore>,
        message_id: &str,
        builder: &TreeBuilder,
    ) -> Result<Self> {
        let stored = store::lock(store)?.message(message_id)?;
        let data = read_file(&stored.path)?;
        let mut message = Self::build(
            data,
            Source::Store {
                message_id: stored.message_id,
                path: stored.path,
            },
            builder,
        )?;
        message.load_tags(store)?;
        Ok(message)
    }

    fn build(data: Vec<u8>, source: Source, builder: &TreeBuilder) -> Result<Self> {
        let start = content_start(&data);
        let raw = if start == 0 { data } else { data[start..].to_vec() };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(MimeError::Unparseable("message is empty".into()));
        }

        let root = {
            let parsed = MessageParser::default()
                .parse(&raw)
                .ok_or_else(|| MimeError::Unparseable("no message structure found".into()))?;
            builder.build_message(&parsed)
        };
        let headers = MessageHeaders::parse(&raw);
        debug!(
            message_id = %headers.message_id,
            nodes = root.node_count(),
            "Built content tree"
        );

        Ok(Self {
            raw,
            headers,
            root,
            tags: BTreeSet::new(),
            source,
            builder: builder.clone(),
        })
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn subject(&self) -> &str {
        &self.headers.subject
    }

    pub fn message_id(&self) -> &str {
        &self.headers.message_id
    }

    /// The message bytes (without any mbox `From ` line).
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn root(&self) -> &ContentNode {
        &self.root
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub(crate) fn tags_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.tags
    }

    // ── Composition ────────────────────────────────────────────

    /// The body as one text, with alternatives resolved for `mode`.
    pub fn viewable_text(&self, mode: RenderMode) -> String {
        TextComposer::new(self.builder.cite_color()).compose(&self.root, mode)
    }

    /// [`viewable_text`](Self::viewable_text) from the two request flags.
    pub fn viewable_text_for(&self, want_html: bool, want_html_fallback: bool) -> Result<String> {
        Ok(self.viewable_text(RenderMode::from_flags(want_html, want_html_fallback)?))
    }

    /// Every attachment leaf, pre-order. Alternative resolution does not apply.
    pub fn attachments(&self) -> Vec<&ContentNode> {
        self.root.iter().filter(|n| n.is_attachment()).collect()
    }

    /// Descriptors for [`attachments`](Self::attachments).
    pub fn attachment_descriptors(&self) -> Vec<Attachment> {
        self.attachments()
            .into_iter()
            .filter_map(|node| Attachment::from_node(node).ok())
            .collect()
    }

    /// Every `EmbeddedMessage` node, pre-order.
    pub fn embedded_message_nodes(&self) -> Vec<&ContentNode> {
        self.root
            .iter()
            .filter(|n| n.variant() == Variant::EmbeddedMessage)
            .collect()
    }

    /// The embedded messages as standalone in-memory messages.
    pub fn embedded_messages(&self) -> Result<Vec<Message>> {
        self.embedded_message_nodes()
            .into_iter()
            .map(|node| embedded_message(node, &self.builder))
            .collect()
    }

    pub fn find_by_id(&self, id: NodeId) -> Option<&ContentNode> {
        self.root.find_by_id(id)
    }

    /// Transfer-decoded bytes of the leaf with `id`.
    pub fn contents(&self, id: NodeId) -> Result<Vec<u8>> {
        self.find_by_id(id)
            .ok_or(MimeError::NodeNotFound(id))?
            .raw_contents()
    }

    // ── Saving ─────────────────────────────────────────────────

    /// Write the message to `dest`: file-backed messages are copied byte
    /// for byte, in-memory ones are written from their bytes.
    pub fn save_to(&self, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        info!(dest = %dest.display(), "Saving message");
        match self.source.path() {
            Some(src) => {
                std::fs::copy(src, dest).map_err(|e| MimeError::io(dest, e))?;
            }
            None => std::fs::write(dest, &self.raw).map_err(|e| MimeError::io(dest, e))?,
        }
        Ok(())
    }

    /// A default file name for saving.
    ///
    /// The root part's filename if it has one; for patches the sanitized
    /// subject with `.patch`; otherwise the subject with `.eml`.
    pub fn suggested_filename(&self) -> String {
        if let Some(name) = self.root.filename().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        if !self.is_patch() {
            return format!("{}.eml", self.headers.subject);
        }

        let name = UNSAFE_FILENAME_CHARS.replace_all(&self.headers.subject, "_");
        let mut name = name.trim_start_matches('_');
        if name.len() >= 5 && name[..5].eq_ignore_ascii_case("PATCH") {
            name = &name[5..];
        }
        format!("{}.patch", name.trim_start_matches('_'))
    }

    /// Subject looks like `[PATCH ...]` and is not a reply.
    pub fn is_patch(&self) -> bool {
        let subject = &self.headers.subject;
        let is_reply = subject
            .get(..3)
            .is_some_and(|p| p.eq_ignore_ascii_case("re:"));
        !is_reply && PATCH_RE.is_match(subject)
    }

    // ── Tags ───────────────────────────────────────────────────

    /// Replace the tag set with the store's current tags.
    pub fn load_tags(&mut self, store: &Mutex<dyn MailStore>) -> Result<()> {
        let Source::Store { message_id, .. } = &self.source else {
            return Err(MimeError::NotInStore(self.describe()));
        };
        let tags = store::lock(store)?.tags(message_id)?;
        debug!(message_id = %message_id, count = tags.len(), "Loaded tags");
        self.tags = tags;
        Ok(())
    }

    fn describe(&self) -> String {
        if self.headers.message_id.is_empty() {
            format!("message '{}'", self.headers.subject)
        } else {
            format!("<{}>", self.headers.message_id)
        }
    }
}

pub(crate) fn embedded_message(node: &ContentNode, builder: &TreeBuilder) -> Result<Message> {
    let raw = node.message_bytes().ok_or(MimeError::UnsupportedOperation {
        id: node.id(),
        variant: node.variant(),
        operation: "embedded_message",
    })?;
    Message::from_bytes_with(raw, builder)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MimeError::FileNotFound(path.to_path_buf())
        } else {
            MimeError::io(path, e)
        }
    })
}

/// Offset of the message proper: skips a UTF-8 BOM and an mbox `From ` line.
fn content_start(data: &[u8]) -> usize {
    let mut start = 0;
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        start = 3;
    }
    if data[start..].starts_with(b"From ") {
        if let Some(pos) = data[start..].iter().position(|&b| b == b'\n') {
            start += pos + 1;
        }
    }
    start
}

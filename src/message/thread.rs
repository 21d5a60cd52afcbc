//! An ordered collection of messages belonging to one conversation.

use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, error};

use crate::error::{MimeError, Result};
use crate::message::{embedded_message, Message};
use crate::mime::builder::TreeBuilder;
use crate::mime::node::{ContentNode, Variant};
use crate::store::{self, MailStore, ThreadInfo};

/// Messages of one thread, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct MessageThread {
    thread_id: Option<String>,
    subject: String,
    messages: Vec<Message>,
}

impl MessageThread {
    /// A thread that is not backed by the store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A thread known to the store; call [`load_messages`](Self::load_messages) to fill it.
    pub fn from_info(info: ThreadInfo) -> Self {
        Self {
            thread_id: Some(info.thread_id),
            subject: info.subject,
            messages: Vec::new(),
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Refresh the subject from the store and append every message of the thread.
    ///
    /// Returns the number of messages appended.
    pub fn load_messages(&mut self, store: &Mutex<dyn MailStore>, builder: &TreeBuilder) -> Result<usize> {
        let thread_id = self
            .thread_id
            .clone()
            .ok_or_else(|| MimeError::NotInStore(format!("thread '{}'", self.subject)))?;

        let (info, stored) = {
            let guard = store::lock(store)?;
            (guard.thread(&thread_id)?, guard.thread_messages(&thread_id)?)
        };
        // Nothing is appended unless every message loads.
        let messages = stored
            .iter()
            .map(|entry| Message::from_store(store, &entry.message_id, builder))
            .collect::<Result<Vec<_>>>()?;

        self.subject = info.subject;
        let loaded = messages.len();
        for message in messages {
            self.add_message(message);
        }
        debug!(thread_id = %thread_id, loaded, "Loaded thread");
        Ok(loaded)
    }

    /// Load a message file and append it.
    pub fn add_message_file(&mut self, path: impl AsRef<Path>, builder: &TreeBuilder) -> Result<()> {
        let message = Message::from_file_with(path, builder)?;
        self.add_message(message);
        Ok(())
    }

    /// Append a message. The first message added to a thread without a
    /// subject provides it.
    pub fn add_message(&mut self, message: Message) {
        if self.subject.is_empty() {
            self.subject = message.subject().to_string();
        }
        self.messages.push(message);
    }

    /// Append the message wrapped by an `EmbeddedMessage` node.
    pub fn add_embedded(&mut self, node: &ContentNode, builder: &TreeBuilder) -> Result<()> {
        if node.variant() != Variant::EmbeddedMessage {
            error!(id = node.id(), variant = ?node.variant(), "Only embedded messages can be added to a thread");
            return Err(MimeError::UnsupportedOperation {
                id: node.id(),
                variant: node.variant(),
                operation: "add_embedded",
            });
        }
        let message = embedded_message(node, builder)?;
        self.add_message(message);
        Ok(())
    }
}

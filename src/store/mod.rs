//! The mail-store collaborator: where threads, message files, and tags live.
//!
//! The core only reads from the store. Handles are not assumed to be safe
//! for concurrent use, so they are shared behind a [`Mutex`] and every call
//! is made with the lock held.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{MimeError, Result};

/// Thread metadata known to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub thread_id: String,
    pub subject: String,
}

/// A message as the store knows it: an id and the file holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message_id: String,
    pub path: PathBuf,
}

/// Read access to a mail store.
pub trait MailStore: Send {
    /// Metadata for one thread.
    fn thread(&self, thread_id: &str) -> Result<ThreadInfo>;

    /// Messages of a thread, oldest first.
    fn thread_messages(&self, thread_id: &str) -> Result<Vec<StoredMessage>>;

    /// Look up one message by id.
    fn message(&self, message_id: &str) -> Result<StoredMessage>;

    /// Current tags of a message.
    fn tags(&self, message_id: &str) -> Result<BTreeSet<String>>;
}

/// A store handle shared between messages.
pub type SharedStore = Arc<Mutex<dyn MailStore>>;

/// Wrap a store for sharing.
pub fn shared(store: impl MailStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock a store, mapping a poisoned lock to [`MimeError::Store`].
pub fn lock<'a, 's>(
    store: &'a Mutex<dyn MailStore + 's>,
) -> Result<MutexGuard<'a, dyn MailStore + 's>> {
    store
        .lock()
        .map_err(|_| MimeError::Store("mail store lock poisoned".into()))
}

/// A store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    threads: BTreeMap<String, ThreadInfo>,
    thread_members: BTreeMap<String, Vec<String>>,
    messages: BTreeMap<String, StoredMessage>,
    tags: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thread(&mut self, info: ThreadInfo) {
        self.thread_members.entry(info.thread_id.clone()).or_default();
        self.threads.insert(info.thread_id.clone(), info);
    }

    /// Register a message and append it to `thread_id`, creating the thread if needed.
    pub fn add_message<I, S>(&mut self, thread_id: &str, message: StoredMessage, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.threads.contains_key(thread_id) {
            self.add_thread(ThreadInfo {
                thread_id: thread_id.to_string(),
                subject: String::new(),
            });
        }
        self.thread_members
            .entry(thread_id.to_string())
            .or_default()
            .push(message.message_id.clone());
        self.tags.insert(
            message.message_id.clone(),
            tags.into_iter().map(Into::into).collect(),
        );
        self.messages.insert(message.message_id.clone(), message);
    }

    /// Replace the stored tags of a message.
    pub fn set_tags(&mut self, message_id: &str, tags: BTreeSet<String>) -> Result<()> {
        match self.tags.get_mut(message_id) {
            Some(current) => {
                *current = tags;
                Ok(())
            }
            None => Err(unknown_message(message_id)),
        }
    }
}

fn unknown_message(message_id: &str) -> MimeError {
    MimeError::Store(format!("unknown message '{message_id}'"))
}

impl MailStore for MemoryStore {
    fn thread(&self, thread_id: &str) -> Result<ThreadInfo> {
        self.threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| MimeError::Store(format!("unknown thread '{thread_id}'")))
    }

    fn thread_messages(&self, thread_id: &str) -> Result<Vec<StoredMessage>> {
        let members = self
            .thread_members
            .get(thread_id)
            .ok_or_else(|| MimeError::Store(format!("unknown thread '{thread_id}'")))?;
        members.iter().map(|id| self.message(id)).collect()
    }

    fn message(&self, message_id: &str) -> Result<StoredMessage> {
        self.messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| unknown_message(message_id))
    }

    fn tags(&self, message_id: &str) -> Result<BTreeSet<String>> {
        self.tags
            .get(message_id)
            .cloned()
            .ok_or_else(|| unknown_message(message_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_thread(ThreadInfo {
            thread_id: "t1".into(),
            subject: "Lunch".into(),
        });
        store.add_message(
            "t1",
            StoredMessage {
                message_id: "a@example.org".into(),
                path: PathBuf::from("/mail/a.eml"),
            },
            ["inbox", "unread"],
        );
        store.add_message(
            "t1",
            StoredMessage {
                message_id: "b@example.org".into(),
                path: PathBuf::from("/mail/b.eml"),
            },
            ["inbox"],
        );
        store
    }

    #[test]
    fn test_thread_messages_in_order() {
        let store = sample();
        let ids: Vec<String> = store
            .thread_messages("t1")
            .unwrap()
            .into_iter()
            .map(|m| m.message_id)
            .collect();
        assert_eq!(ids, vec!["a@example.org", "b@example.org"]);
        assert_eq!(store.thread("t1").unwrap().subject, "Lunch");
    }

    #[test]
    fn test_unknown_ids_are_store_errors() {
        let store = sample();
        assert!(matches!(store.thread("nope"), Err(MimeError::Store(_))));
        assert!(matches!(store.tags("nope"), Err(MimeError::Store(_))));
    }

    #[test]
    fn test_shared_store_lock() {
        let shared = shared(sample());
        let guard = lock(&shared).unwrap();
        assert!(guard.tags("a@example.org").unwrap().contains("unread"));
    }

    #[test]
    fn test_lock_borrowed_store() {
        let store = Mutex::new(sample());
        let borrowed: &Mutex<dyn MailStore> = &store;
        let tags = lock(borrowed).unwrap().tags("b@example.org").unwrap();
        assert_eq!(tags, BTreeSet::from(["inbox".to_string()]));
    }

    #[test]
    fn test_poisoned_lock_is_store_error() {
        let shared = shared(sample());
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the store");
        })
        .join();
        assert!(matches!(lock(&shared), Err(MimeError::Store(_))));
    }

    #[test]
    fn test_set_tags() {
        let mut store = sample();
        store
            .set_tags("b@example.org", BTreeSet::from(["archive".to_string()]))
            .unwrap();
        assert_eq!(store.tags("b@example.org").unwrap().len(), 1);
        assert!(store.set_tags("zzz", BTreeSet::new()).is_err());
    }
}

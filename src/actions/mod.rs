//! Undoable actions on messages.
//!
//! The core never changes tags by itself; an action layer applies
//! [`TagAction`]s to anything [`Taggable`] and can undo them.

pub mod tag;

use std::collections::BTreeSet;

use tracing::debug;

use crate::message::Message;

pub use tag::TagAction;

/// Something carrying a mutable set of tags.
pub trait Taggable {
    fn tag_set(&self) -> &BTreeSet<String>;
    fn tag_set_mut(&mut self) -> &mut BTreeSet<String>;
}

impl Taggable for Message {
    fn tag_set(&self) -> &BTreeSet<String> {
        self.tags()
    }

    fn tag_set_mut(&mut self) -> &mut BTreeSet<String> {
        self.tags_mut()
    }
}

impl Taggable for BTreeSet<String> {
    fn tag_set(&self) -> &BTreeSet<String> {
        self
    }

    fn tag_set_mut(&mut self) -> &mut BTreeSet<String> {
        self
    }
}

/// A change that can be applied to a [`Taggable`], and possibly reverted.
pub trait Action {
    /// Apply the action. Returns `true` if the target changed.
    fn doit(&mut self, target: &mut dyn Taggable) -> bool;

    /// Revert the last [`doit`](Action::doit) on the same target.
    fn undo(&mut self, target: &mut dyn Taggable) -> bool;

    fn undoable(&self) -> bool {
        false
    }
}

/// Performed actions, newest last.
///
/// The stack does not remember targets: undo must be called with the
/// target the action was performed on.
#[derive(Default)]
pub struct UndoStack {
    done: Vec<Box<dyn Action>>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` on `target`, keeping it for undo if it is undoable.
    pub fn perform(&mut self, mut action: Box<dyn Action>, target: &mut dyn Taggable) -> bool {
        let changed = action.doit(target);
        if action.undoable() {
            self.done.push(action);
        }
        changed
    }

    /// Undo the most recent action. `None` when nothing is left to undo.
    pub fn undo(&mut self, target: &mut dyn Taggable) -> Option<bool> {
        let mut action = self.done.pop()?;
        debug!(remaining = self.done.len(), "Undoing action");
        Some(action.undo(target))
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}

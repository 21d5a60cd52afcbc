//! Adding and removing tags.

use std::collections::BTreeSet;

use tracing::info;

use super::{Action, Taggable};

/// Add one set of tags and remove another.
///
/// Each [`doit`](Action::doit) first narrows both sets to the changes that
/// actually apply to the target: tags already present are dropped from
/// `add`, absent ones from `remove`, and a tag named in both is left alone.
/// Undoing swaps the sets, which then restores the previous tag set exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagAction {
    add: BTreeSet<String>,
    remove: BTreeSet<String>,
}

impl TagAction {
    pub fn new<A, R, S>(add: A, remove: R) -> Self
    where
        A: IntoIterator<Item = S>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            add: add.into_iter().map(Into::into).collect(),
            remove: remove.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add(&self) -> &BTreeSet<String> {
        &self.add
    }

    pub fn remove(&self) -> &BTreeSet<String> {
        &self.remove
    }

    fn narrow(&mut self, current: &BTreeSet<String>) {
        let add: BTreeSet<String> = self
            .add
            .iter()
            .filter(|t| !current.contains(*t) && !self.remove.contains(*t))
            .cloned()
            .collect();
        let remove: BTreeSet<String> = self
            .remove
            .iter()
            .filter(|t| current.contains(*t) && !self.add.contains(*t))
            .cloned()
            .collect();
        self.add = add;
        self.remove = remove;
    }
}

impl Action for TagAction {
    fn doit(&mut self, target: &mut dyn Taggable) -> bool {
        self.narrow(target.tag_set());
        info!(add = ?self.add, remove = ?self.remove, "Applying tags");

        let tags = target.tag_set_mut();
        for tag in &self.add {
            tags.insert(tag.clone());
        }
        for tag in &self.remove {
            tags.remove(tag);
        }
        !(self.add.is_empty() && self.remove.is_empty())
    }

    fn undo(&mut self, target: &mut dyn Taggable) -> bool {
        std::mem::swap(&mut self.add, &mut self.remove);
        self.doit(target)
    }

    fn undoable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::UndoStack;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Apply (add, remove), then (remove, add), and compare with the start.
    fn round_trip(start: &[&str], add: &[&str], remove: &[&str]) {
        let original = tags(start);
        let mut target = original.clone();
        let mut action = TagAction::new(add.iter().copied(), remove.iter().copied());
        action.doit(&mut target);
        for t in add {
            if !remove.contains(t) {
                assert!(target.contains(*t), "{t} should be added");
            }
        }
        action.undo(&mut target);
        assert_eq!(target, original, "start={start:?} add={add:?} remove={remove:?}");
    }

    #[test]
    fn test_disjoint_sets_restore() {
        round_trip(&["inbox", "unread"], &["flagged"], &["unread"]);
    }

    #[test]
    fn test_redundant_changes_restore() {
        // "inbox" is already present, "spam" already absent.
        round_trip(&["inbox"], &["inbox"], &["spam"]);
    }

    #[test]
    fn test_overlapping_sets_restore() {
        round_trip(&["inbox"], &["inbox", "todo"], &["inbox", "todo"]);
        round_trip(&[], &["a"], &["a"]);
    }

    #[test]
    fn test_empty_sets_restore() {
        round_trip(&[], &[], &[]);
        round_trip(&["x"], &[], &[]);
    }

    #[test]
    fn test_doit_reports_change() {
        let mut target = tags(&["inbox"]);
        assert!(!TagAction::new(["inbox"], []).doit(&mut target));
        assert!(TagAction::new(["todo"], []).doit(&mut target));
        assert_eq!(target, tags(&["inbox", "todo"]));
    }

    #[test]
    fn test_undo_stack() {
        let mut target = tags(&["inbox", "unread"]);
        let mut stack = UndoStack::new();
        stack.perform(Box::new(TagAction::new(["archived"], ["inbox"])), &mut target);
        stack.perform(Box::new(TagAction::new([], ["unread"])), &mut target);
        assert_eq!(target, tags(&["archived"]));
        assert_eq!(stack.len(), 2);

        assert_eq!(stack.undo(&mut target), Some(true));
        assert_eq!(target, tags(&["archived", "unread"]));
        assert_eq!(stack.undo(&mut target), Some(true));
        assert_eq!(target, tags(&["inbox", "unread"]));
        assert_eq!(stack.undo(&mut target), None);
    }
}

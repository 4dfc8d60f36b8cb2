use std::collections::{BTreeMap, BTreeSet};

use crate::firestore::local::local_view_changes::LocalViewChanges;
use crate::firestore::model::{DocumentKey, TargetId};

/// Two-way index of which targets pin which document keys.
///
/// A key stays pinned while at least one target references it. Operations that
/// drop references report the keys whose last pin went away so the caller can
/// release them from the cache.
#[derive(Clone, Debug, Default)]
pub struct ReferenceSet {
    by_key: BTreeMap<DocumentKey, BTreeSet<TargetId>>,
    by_target: BTreeMap<TargetId, BTreeSet<DocumentKey>>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn contains_key(&self, key: &DocumentKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn add_reference(&mut self, key: DocumentKey, target_id: TargetId) {
        self.by_target
            .entry(target_id)
            .or_default()
            .insert(key.clone());
        self.by_key.entry(key).or_default().insert(target_id);
    }

    /// Returns true when `key` is no longer referenced by any target.
    pub fn remove_reference(&mut self, key: &DocumentKey, target_id: TargetId) -> bool {
        if let Some(keys) = self.by_target.get_mut(&target_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_target.remove(&target_id);
            }
        }

        match self.by_key.get_mut(key) {
            Some(targets) => {
                if !targets.remove(&target_id) {
                    return false;
                }
                if targets.is_empty() {
                    self.by_key.remove(key);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub fn add_references<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a DocumentKey>,
        target_id: TargetId,
    ) {
        for key in keys {
            self.add_reference(key.clone(), target_id);
        }
    }

    pub fn remove_references<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a DocumentKey>,
        target_id: TargetId,
    ) -> BTreeSet<DocumentKey> {
        let mut released = BTreeSet::new();
        for key in keys {
            if self.remove_reference(key, target_id) {
                released.insert(key.clone());
            }
        }
        released
    }

    /// Drops every reference held by `target_id`.
    pub fn remove_references_for_target(&mut self, target_id: TargetId) -> BTreeSet<DocumentKey> {
        let keys = self.references_for_target(target_id);
        self.remove_references(&keys, target_id)
    }

    pub fn references_for_target(&self, target_id: TargetId) -> BTreeSet<DocumentKey> {
        self.by_target.get(&target_id).cloned().unwrap_or_default()
    }

    pub fn targets_for_key(&self, key: &DocumentKey) -> BTreeSet<TargetId> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    /// Applies one evaluation's membership transitions. Returns released keys.
    pub fn apply_view_changes(&mut self, changes: &LocalViewChanges) -> BTreeSet<DocumentKey> {
        self.add_references(changes.added_keys(), changes.target_id());
        self.remove_references(changes.removed_keys(), changes.target_id())
    }
}

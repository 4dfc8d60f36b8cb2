use std::collections::{BTreeMap, BTreeSet};

use crate::firestore::error::{invariant_violation, FirestoreResult};
use crate::firestore::model::{Document, DocumentKey, DocumentSet, TargetId};

/// How a single document moved between two evaluations of a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Removed,
    Added,
    /// Version or data differ.
    Modified,
    /// Only the pending-write flag differs.
    Metadata,
}

impl ChangeType {
    /// Rank used to order changes inside a snapshot.
    fn rank(self) -> u8 {
        match self {
            ChangeType::Removed => 0,
            ChangeType::Added => 1,
            ChangeType::Modified => 2,
            ChangeType::Metadata => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentViewChange {
    pub change_type: ChangeType,
    pub document: Document,
}

impl DocumentViewChange {
    pub fn new(change_type: ChangeType, document: Document) -> Self {
        Self {
            change_type,
            document,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        self.document.key()
    }
}

/// Accumulates at most one change per key, collapsing successive changes to
/// the same key into their combined effect.
#[derive(Clone, Debug, Default)]
pub struct DocumentViewChangeSet {
    changes: BTreeMap<DocumentKey, DocumentViewChange>,
}

impl DocumentViewChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, key: &DocumentKey) -> Option<&DocumentViewChange> {
        self.changes.get(key)
    }

    pub fn track(&mut self, change: DocumentViewChange) -> FirestoreResult<()> {
        use ChangeType::*;

        let key = change.key().clone();
        let Some(old) = self.changes.get(&key) else {
            self.changes.insert(key, change);
            return Ok(());
        };

        let merged = match (old.change_type, change.change_type) {
            (Added, Metadata) | (Added, Modified) => Some(DocumentViewChange::new(Added, change.document)),
            (Metadata, Metadata) => Some(change),
            (Metadata, Modified) | (Modified, Metadata) | (Modified, Modified) => {
                Some(DocumentViewChange::new(Modified, change.document))
            }
            (Modified, Removed) | (Metadata, Removed) => Some(DocumentViewChange::new(Removed, old.document.clone())),
            (Removed, Added) => Some(DocumentViewChange::new(Modified, change.document)),
            (Added, Removed) => None,
            (old_type, new_type) => {
                return Err(invariant_violation(format!(
                    "Unsupported combination of changes for {key}: {old_type:?} followed by {new_type:?}"
                )))
            }
        };

        match merged {
            Some(merged) => {
                self.changes.insert(key, merged);
            }
            None => {
                self.changes.remove(&key);
            }
        }
        Ok(())
    }

    /// Changes ordered by type rank, then by `documents`' ordering.
    pub fn changes(&self, documents: &DocumentSet) -> Vec<DocumentViewChange> {
        let mut changes: Vec<DocumentViewChange> = self.changes.values().cloned().collect();
        changes.sort_by(|left, right| {
            left.change_type
                .rank()
                .cmp(&right.change_type.rank())
                .then_with(|| documents.compare(&left.document, &right.document))
        });
        changes
    }
}

/// Result of one evaluation of a target, plus its delta from the previous one.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewSnapshot {
    pub target_id: TargetId,
    pub documents: DocumentSet,
    pub old_documents: DocumentSet,
    pub document_changes: Vec<DocumentViewChange>,
    pub from_cache: bool,
    /// Keys in `documents` that carry pending writes.
    pub mutated_keys: BTreeSet<DocumentKey>,
    pub sync_state_changed: bool,
    pub excludes_metadata_changes: bool,
}

impl ViewSnapshot {
    /// Snapshot for a target's first delivery: everything in `documents` is
    /// reported as added.
    pub fn from_initial_documents(
        target_id: TargetId,
        documents: DocumentSet,
        mutated_keys: BTreeSet<DocumentKey>,
        from_cache: bool,
        excludes_metadata_changes: bool,
    ) -> Self {
        let document_changes = documents
            .iter()
            .cloned()
            .map(|doc| DocumentViewChange::new(ChangeType::Added, doc))
            .collect();
        Self {
            target_id,
            old_documents: documents.empty_like(),
            documents,
            document_changes,
            from_cache,
            mutated_keys,
            sync_state_changed: true,
            excludes_metadata_changes,
        }
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.mutated_keys.is_empty()
    }

    pub fn keys_with_change(&self, change_type: ChangeType) -> BTreeSet<DocumentKey> {
        self.document_changes
            .iter()
            .filter(|change| change.change_type == change_type)
            .map(|change| change.key().clone())
            .collect()
    }
}

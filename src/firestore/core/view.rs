use std::collections::BTreeSet;

use crate::firestore::core::view_snapshot::{
    ChangeType, DocumentViewChange, DocumentViewChangeSet, ViewSnapshot,
};
use crate::firestore::error::{invariant_violation, FirestoreResult};
use crate::firestore::model::{
    DocumentComparator, DocumentKey, DocumentSet, MaybeDocument, MaybeDocumentMap, TargetId,
};

/// Document changes computed for a view but not yet applied to it.
#[derive(Clone, Debug)]
pub struct ViewDocumentChanges {
    pub document_set: DocumentSet,
    pub change_set: DocumentViewChangeSet,
    pub mutated_keys: BTreeSet<DocumentKey>,
}

/// Outcome of applying changes: the view to keep and, when something
/// observable changed, the snapshot to deliver.
#[derive(Clone, Debug)]
pub struct ViewChange {
    pub view: View,
    pub snapshot: Option<ViewSnapshot>,
}

/// Last evaluated state of one target. Never mutated in place; applying
/// changes produces the successor view.
#[derive(Clone, Debug)]
pub struct View {
    target_id: TargetId,
    documents: DocumentSet,
    mutated_keys: BTreeSet<DocumentKey>,
    current: bool,
    has_emitted: bool,
}

impl View {
    pub fn new(target_id: TargetId, comparator: DocumentComparator) -> Self {
        Self {
            target_id,
            documents: DocumentSet::new(comparator),
            mutated_keys: BTreeSet::new(),
            current: false,
            has_emitted: false,
        }
    }

    pub fn target_id(&self) -> TargetId {
        self.target_id
    }

    pub fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    pub fn mutated_keys(&self) -> &BTreeSet<DocumentKey> {
        &self.mutated_keys
    }

    /// Whether the last evaluation was in sync with the backend.
    pub fn is_current(&self) -> bool {
        self.current
    }

    pub fn has_evaluated(&self) -> bool {
        self.has_emitted
    }

    /// Builds the new result set from the externally evaluated membership and
    /// diffs it against the current one.
    ///
    /// Only found documents enter a result set: deleted and unknown entries in
    /// `membership` are dropped. A member key with no entry in `documents` is an
    /// invariant violation.
    pub fn compute_doc_changes(
        &self,
        membership: &BTreeSet<DocumentKey>,
        documents: &MaybeDocumentMap,
    ) -> FirestoreResult<ViewDocumentChanges> {
        let mut found = Vec::with_capacity(membership.len());
        for key in membership {
            match documents.get(key) {
                Some(MaybeDocument::Document(doc)) => found.push(doc.clone()),
                Some(other) => {
                    log::debug!(
                        "target {} excludes {key}: existence is {:?}",
                        self.target_id,
                        other.existence()
                    );
                }
                None => {
                    return Err(invariant_violation(format!(
                        "target {} lists {key} but no local document exists for it",
                        self.target_id
                    )))
                }
            }
        }

        let document_set = DocumentSet::from_documents(self.documents.comparator(), found);
        let change_set = diff_document_sets(&self.documents, &document_set)?;
        let mutated_keys = document_set
            .iter()
            .filter(|doc| doc.has_pending_writes())
            .map(|doc| doc.key().clone())
            .collect();

        Ok(ViewDocumentChanges {
            document_set,
            change_set,
            mutated_keys,
        })
    }

    /// Applies computed changes. A snapshot is produced for the first
    /// application and afterwards whenever documents or the sync state changed.
    pub fn apply_changes(&self, changes: ViewDocumentChanges, current: bool) -> ViewChange {
        let sync_state_changed = !self.has_emitted || self.current != current;
        let document_changes = changes.change_set.changes(&changes.document_set);

        let snapshot = if document_changes.is_empty() && !sync_state_changed {
            None
        } else {
            Some(ViewSnapshot {
                target_id: self.target_id,
                documents: changes.document_set.clone(),
                old_documents: self.documents.clone(),
                document_changes,
                from_cache: !current,
                mutated_keys: changes.mutated_keys.clone(),
                sync_state_changed,
                excludes_metadata_changes: false,
            })
        };

        let view = View {
            target_id: self.target_id,
            documents: changes.document_set,
            mutated_keys: changes.mutated_keys,
            current,
            has_emitted: true,
        };

        ViewChange { view, snapshot }
    }

    pub fn evaluate(
        &self,
        membership: &BTreeSet<DocumentKey>,
        documents: &MaybeDocumentMap,
        current: bool,
    ) -> FirestoreResult<ViewChange> {
        let changes = self.compute_doc_changes(membership, documents)?;
        Ok(self.apply_changes(changes, current))
    }
}

/// Classifies every key in `old ∪ new` as added, removed, modified, metadata
/// only, or unchanged. Unchanged keys are omitted from the result.
pub fn diff_document_sets(
    old: &DocumentSet,
    new: &DocumentSet,
) -> FirestoreResult<DocumentViewChangeSet> {
    let mut change_set = DocumentViewChangeSet::new();
    let keys: BTreeSet<DocumentKey> = old.keys().into_iter().chain(new.keys()).collect();

    for key in &keys {
        let change = match (old.get(key), new.get(key)) {
            (None, Some(new_doc)) => Some(DocumentViewChange::new(ChangeType::Added, new_doc.clone())),
            (Some(old_doc), None) => {
                Some(DocumentViewChange::new(ChangeType::Removed, old_doc.clone()))
            }
            (Some(old_doc), Some(new_doc)) => {
                if !old_doc.same_content(new_doc) {
                    Some(DocumentViewChange::new(ChangeType::Modified, new_doc.clone()))
                } else if old_doc.has_pending_writes() != new_doc.has_pending_writes() {
                    Some(DocumentViewChange::new(ChangeType::Metadata, new_doc.clone()))
                } else {
                    None
                }
            }
            (None, None) => None,
        };
        if let Some(change) = change {
            change_set.track(change)?;
        }
    }

    Ok(change_set)
}

use std::collections::BTreeSet;

use serde::Serialize;

use crate::firestore::core::{ChangeType, ViewSnapshot};
use crate::firestore::error::{invariant_violation, FirestoreResult};
use crate::firestore::model::{DocumentKey, TargetId};

/// Membership transitions of one target for one evaluation.
///
/// Modified and metadata-only changes never appear here: pinning only cares
/// about keys entering or leaving a target.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalViewChanges {
    target_id: TargetId,
    added_keys: BTreeSet<DocumentKey>,
    removed_keys: BTreeSet<DocumentKey>,
}

impl LocalViewChanges {
    pub fn new(
        target_id: TargetId,
        added_keys: BTreeSet<DocumentKey>,
        removed_keys: BTreeSet<DocumentKey>,
    ) -> FirestoreResult<Self> {
        if let Some(key) = added_keys.intersection(&removed_keys).next() {
            log::error!("target {target_id}: {key} both added and removed in one evaluation");
            return Err(invariant_violation(format!(
                "Key {key} cannot be both added to and removed from target {target_id}"
            )));
        }
        Ok(Self {
            target_id,
            added_keys,
            removed_keys,
        })
    }

    pub fn from_view_snapshot(target_id: TargetId, snapshot: &ViewSnapshot) -> FirestoreResult<Self> {
        Self::new(
            target_id,
            snapshot.keys_with_change(ChangeType::Added),
            snapshot.keys_with_change(ChangeType::Removed),
        )
    }

    /// Record for the registration path, where only raw key sets are known.
    pub fn from_key_sets(
        target_id: TargetId,
        before: &BTreeSet<DocumentKey>,
        after: &BTreeSet<DocumentKey>,
    ) -> FirestoreResult<Self> {
        Self::new(
            target_id,
            after.difference(before).cloned().collect(),
            before.difference(after).cloned().collect(),
        )
    }

    pub fn target_id(&self) -> TargetId {
        self.target_id
    }

    pub fn added_keys(&self) -> &BTreeSet<DocumentKey> {
        &self.added_keys
    }

    pub fn removed_keys(&self) -> &BTreeSet<DocumentKey> {
        &self.removed_keys
    }

    pub fn is_empty(&self) -> bool {
        self.added_keys.is_empty() && self.removed_keys.is_empty()
    }
}

use crate::firestore::error::FirestoreResult;
use crate::firestore::model::{DocumentKey, FieldPath, MaybeDocument, SnapshotVersion};
use crate::firestore::value::MapValue;

/// A local write queued for one document before the backend acknowledges it.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Replaces the document's data.
    Set { key: DocumentKey, data: MapValue },
    /// Overwrites the fields named in `field_mask` with the values found in
    /// `data`. Masked paths missing from `data` are deleted.
    Patch {
        key: DocumentKey,
        data: MapValue,
        field_mask: Vec<FieldPath>,
    },
    Delete { key: DocumentKey },
}

impl Mutation {
    pub fn set(key: DocumentKey, data: MapValue) -> Self {
        Mutation::Set { key, data }
    }

    /// Patch whose mask is every leaf path present in `data`. Fails when a
    /// field name cannot form a path, such as the empty string.
    pub fn patch(key: DocumentKey, data: MapValue) -> FirestoreResult<Self> {
        let field_mask = leaf_paths(&data)?;
        Ok(Mutation::Patch {
            key,
            data,
            field_mask,
        })
    }

    pub fn patch_with_mask(key: DocumentKey, data: MapValue, field_mask: Vec<FieldPath>) -> Self {
        Mutation::Patch {
            key,
            data,
            field_mask,
        }
    }

    pub fn delete(key: DocumentKey) -> Self {
        Mutation::Delete { key }
    }

    pub fn key(&self) -> &DocumentKey {
        match self {
            Mutation::Set { key, .. } | Mutation::Patch { key, .. } | Mutation::Delete { key } => {
                key
            }
        }
    }
}

/// Backend acknowledgement of a single write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutationResult {
    pub version: SnapshotVersion,
}

impl MutationResult {
    pub fn new(version: SnapshotVersion) -> Self {
        Self { version }
    }
}

/// One step in the per-key fold, in acceptance order.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationEvent {
    /// Queued locally, not yet acknowledged.
    Local(Mutation),
    /// Acknowledged by the backend at `MutationResult::version`.
    Acknowledged(Mutation, MutationResult),
    /// Authoritative read of the key delivered by the backend.
    Synced(MaybeDocument),
}

impl MutationEvent {
    pub fn key(&self) -> &DocumentKey {
        match self {
            MutationEvent::Local(mutation) | MutationEvent::Acknowledged(mutation, _) => {
                mutation.key()
            }
            MutationEvent::Synced(doc) => doc.key(),
        }
    }
}

fn leaf_paths(data: &MapValue) -> FirestoreResult<Vec<FieldPath>> {
    let mut paths = Vec::new();
    collect_leaf_paths(data, &mut Vec::new(), &mut paths)?;
    Ok(paths)
}

fn collect_leaf_paths(
    map: &MapValue,
    prefix: &mut Vec<String>,
    acc: &mut Vec<FieldPath>,
) -> FirestoreResult<()> {
    for (name, value) in map.fields() {
        prefix.push(name.clone());
        match value.as_map() {
            Some(child) if !child.is_empty() => collect_leaf_paths(child, prefix, acc)?,
            _ => acc.push(FieldPath::new(prefix.iter().cloned())?),
        }
        prefix.pop();
    }
    Ok(())
}

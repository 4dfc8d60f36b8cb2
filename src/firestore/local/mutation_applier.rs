use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{
    Document, DocumentKey, DocumentState, FieldPath, MaybeDocument, Mutation, MutationEvent,
    MutationResult, NoDocument, SnapshotVersion, UnknownDocument,
};
use crate::firestore::value::MapValue;

/// Result of folding a key's mutation events over its base document.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationApplication {
    key: DocumentKey,
    document: Option<MaybeDocument>,
}

impl MutationApplication {
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// `None` only when there was no base and no events.
    pub fn document(&self) -> Option<&MaybeDocument> {
        self.document.as_ref()
    }

    pub fn into_document(self) -> Option<MaybeDocument> {
        self.document
    }

    pub fn document_state(&self) -> Option<DocumentState> {
        self.document.as_ref().map(MaybeDocument::document_state)
    }

    pub fn has_pending_writes(&self) -> bool {
        self.document
            .as_ref()
            .map(MaybeDocument::has_pending_writes)
            .unwrap_or(false)
    }
}

/// Folds `events` (oldest first) over `base` and returns the locally visible
/// document for `key`.
///
/// Local writes keep the running version; acknowledgements and authoritative
/// reads advance it. An authoritative read at or above the running version
/// replaces the running result, after which the unacknowledged local writes
/// seen so far are layered back on top. Older reads are ignored.
pub fn apply_mutations(
    key: &DocumentKey,
    base: Option<MaybeDocument>,
    events: &[MutationEvent],
) -> FirestoreResult<MutationApplication> {
    if let Some(base) = &base {
        ensure_same_key(key, base.key(), "base document")?;
    }

    let mut current = base;
    let mut unacknowledged: Vec<&Mutation> = Vec::new();
    for event in events {
        ensure_same_key(key, event.key(), "mutation event")?;
        current = match event {
            MutationEvent::Local(mutation) => {
                unacknowledged.push(mutation);
                Some(apply_local_mutation(key, current.as_ref(), mutation)?)
            }
            MutationEvent::Acknowledged(mutation, result) => Some(apply_acknowledged_mutation(
                key,
                current.as_ref(),
                mutation,
                result,
            )?),
            MutationEvent::Synced(read) => {
                apply_authoritative_read(key, current, read, &unacknowledged)?
            }
        };
    }

    Ok(MutationApplication {
        key: key.clone(),
        document: current,
    })
}

fn ensure_same_key(expected: &DocumentKey, actual: &DocumentKey, what: &str) -> FirestoreResult<()> {
    if expected != actual {
        return Err(invalid_argument(format!(
            "{what} for '{actual}' cannot be applied to '{expected}'"
        )));
    }
    Ok(())
}

fn running_version(current: Option<&MaybeDocument>) -> SnapshotVersion {
    current
        .map(MaybeDocument::version)
        .unwrap_or_else(SnapshotVersion::none)
}

fn apply_local_mutation(
    key: &DocumentKey,
    current: Option<&MaybeDocument>,
    mutation: &Mutation,
) -> FirestoreResult<MaybeDocument> {
    let version = running_version(current);
    let state = DocumentState::LocalMutations;
    let next: MaybeDocument = match mutation {
        Mutation::Set { data, .. } => Document::new(key.clone(), version, data.clone(), state).into(),
        Mutation::Patch {
            data, field_mask, ..
        } => match current {
            Some(MaybeDocument::Document(doc)) => {
                let patched = apply_field_mask(doc.data(), data, field_mask)?;
                Document::new(key.clone(), version, patched, state).into()
            }
            // Only the patched fields are known; a partial document would
            // hide whatever the acknowledged write produced.
            Some(MaybeDocument::Unknown(unknown)) => unknown.clone().into(),
            Some(MaybeDocument::NoDocument(_)) | None => {
                let patched = apply_field_mask(&MapValue::empty(), data, field_mask)?;
                Document::new(key.clone(), version, patched, state).into()
            }
        },
        Mutation::Delete { .. } => NoDocument::new(key.clone(), version, state).into(),
    };
    Ok(next)
}

fn apply_acknowledged_mutation(
    key: &DocumentKey,
    current: Option<&MaybeDocument>,
    mutation: &Mutation,
    result: &MutationResult,
) -> FirestoreResult<MaybeDocument> {
    let version = result.version;
    let state = DocumentState::CommittedMutations;
    let next: MaybeDocument = match mutation {
        Mutation::Set { data, .. } => Document::new(key.clone(), version, data.clone(), state).into(),
        Mutation::Patch {
            data, field_mask, ..
        } => match current {
            Some(MaybeDocument::Document(doc)) => {
                let patched = apply_field_mask(doc.data(), data, field_mask)?;
                Document::new(key.clone(), version, patched, state).into()
            }
            Some(MaybeDocument::NoDocument(_)) | Some(MaybeDocument::Unknown(_)) | None => {
                UnknownDocument::new(key.clone(), version).into()
            }
        },
        Mutation::Delete { .. } => NoDocument::new(key.clone(), version, state).into(),
    };
    Ok(next)
}

fn apply_authoritative_read(
    key: &DocumentKey,
    current: Option<MaybeDocument>,
    read: &MaybeDocument,
    unacknowledged: &[&Mutation],
) -> FirestoreResult<Option<MaybeDocument>> {
    let synced: MaybeDocument = match read {
        MaybeDocument::Document(doc) => Document::new(
            key.clone(),
            doc.version(),
            doc.data().clone(),
            DocumentState::Synced,
        )
        .into(),
        MaybeDocument::NoDocument(doc) => NoDocument::synced(key.clone(), doc.version()).into(),
        MaybeDocument::Unknown(_) => {
            return Err(invalid_argument(format!(
                "Authoritative read for '{key}' cannot be an unknown document"
            )))
        }
    };

    let version = running_version(current.as_ref());
    if synced.version() < version {
        log::debug!(
            "ignoring read of {key} at {} older than local {}",
            synced.version(),
            version
        );
        return Ok(current);
    }

    let mut next = synced;
    for mutation in unacknowledged {
        next = apply_local_mutation(key, Some(&next), mutation)?;
    }
    Ok(Some(next))
}

fn apply_field_mask(
    base: &MapValue,
    data: &MapValue,
    field_mask: &[FieldPath],
) -> FirestoreResult<MapValue> {
    let mut fields = base.clone();
    for path in field_mask {
        fields = match data.get(path) {
            Some(value) => fields.with_value(path, value.clone())?,
            None => fields.without_field(path)?,
        };
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::model::DocumentExistence;
    use crate::firestore::value::{map_from_json, FirestoreValue};
    use serde_json::{json, Value};

    fn key() -> DocumentKey {
        DocumentKey::from_string("restaurants/r1").unwrap()
    }

    fn data(value: Value) -> MapValue {
        map_from_json(&value).unwrap()
    }

    fn synced_doc(value: Value, version: i64) -> MaybeDocument {
        Document::new(key(), SnapshotVersion::from_seconds(version), data(value), DocumentState::Synced)
            .into()
    }

    fn ack(version: i64) -> MutationResult {
        MutationResult::new(SnapshotVersion::from_seconds(version))
    }

    #[test]
    fn patch_merges_onto_synced_base_without_advancing_version() {
        let base = synced_doc(json!({"a": 1}), 5);
        let events = [MutationEvent::Local(Mutation::patch(key(), data(json!({"b": 2}))).unwrap())];
        let result = apply_mutations(&key(), Some(base), &events).unwrap();

        let expected: MaybeDocument = Document::new(
            key(),
            SnapshotVersion::from_seconds(5),
            data(json!({"a": 1, "b": 2})),
            DocumentState::LocalMutations,
        )
        .into();
        assert_eq!(result.document(), Some(&expected));
        assert!(result.has_pending_writes());
    }

    #[test]
    fn delete_on_absent_base_is_pending_tombstone() {
        let events = [MutationEvent::Local(Mutation::delete(key()))];
        let result = apply_mutations(&key(), None, &events).unwrap();
        let Some(MaybeDocument::NoDocument(doc)) = result.document() else {
            panic!("expected tombstone, got {:?}", result.document());
        };
        assert!(!doc.has_committed_mutations());
        assert!(doc.version().is_none());
        assert!(result.has_pending_writes());
    }

    #[test]
    fn acknowledged_patch_on_pending_delete_becomes_unknown() {
        let base: MaybeDocument =
            NoDocument::new(key(), SnapshotVersion::from_seconds(2), DocumentState::LocalMutations)
                .into();
        let events = [MutationEvent::Acknowledged(
            Mutation::patch(key(), data(json!({"x": 1}))).unwrap(),
            ack(7),
        )];
        let result = apply_mutations(&key(), Some(base), &events).unwrap();
        let doc = result.document().unwrap();
        assert_eq!(doc.existence(), DocumentExistence::Unconfirmed);
        assert_eq!(doc.version(), SnapshotVersion::from_seconds(7));
        assert!(result.has_pending_writes());
    }

    #[test]
    fn acknowledged_set_is_committed_at_ack_version() {
        let events = [MutationEvent::Acknowledged(Mutation::set(key(), data(json!({"n": 1}))), ack(9))];
        let result = apply_mutations(&key(), Some(synced_doc(json!({}), 3)), &events).unwrap();
        assert_eq!(result.document_state(), Some(DocumentState::CommittedMutations));
        assert_eq!(result.document().unwrap().version(), SnapshotVersion::from_seconds(9));
    }

    #[test]
    fn local_writes_after_ack_keep_ack_version() {
        let events = [
            MutationEvent::Acknowledged(Mutation::set(key(), data(json!({"n": 1}))), ack(9)),
            MutationEvent::Local(Mutation::patch(key(), data(json!({"m": 2}))).unwrap()),
        ];
        let result = apply_mutations(&key(), None, &events).unwrap();
        let doc = result.document().and_then(MaybeDocument::as_document).unwrap();
        assert_eq!(doc.version(), SnapshotVersion::from_seconds(9));
        assert_eq!(doc.state(), DocumentState::LocalMutations);
        assert_eq!(doc.data(), &data(json!({"n": 1, "m": 2})));
    }

    #[test]
    fn acknowledged_delete_records_committed_tombstone() {
        let events = [MutationEvent::Acknowledged(Mutation::delete(key()), ack(4))];
        let result = apply_mutations(&key(), Some(synced_doc(json!({"a": 1}), 1)), &events).unwrap();
        let Some(MaybeDocument::NoDocument(doc)) = result.document() else {
            panic!("expected tombstone");
        };
        assert!(doc.has_committed_mutations());
    }

    #[test]
    fn authoritative_read_at_ack_version_clears_pending_writes() {
        let events = [
            MutationEvent::Acknowledged(Mutation::set(key(), data(json!({"n": 1}))), ack(9)),
            MutationEvent::Synced(synced_doc(json!({"n": 2}), 9)),
        ];
        let result = apply_mutations(&key(), None, &events).unwrap();
        assert!(!result.has_pending_writes());
        assert_eq!(
            result.document().and_then(|doc| doc.field(&FieldPath::from_dot_separated("n").unwrap())),
            Some(&FirestoreValue::from_integer(2))
        );
    }

    #[test]
    fn stale_authoritative_read_is_ignored() {
        let events = [
            MutationEvent::Acknowledged(Mutation::set(key(), data(json!({"n": 1}))), ack(9)),
            MutationEvent::Synced(synced_doc(json!({"n": 0}), 3)),
        ];
        let result = apply_mutations(&key(), None, &events).unwrap();
        assert_eq!(result.document_state(), Some(DocumentState::CommittedMutations));
    }

    #[test]
    fn authoritative_read_keeps_unacknowledged_writes_on_top() {
        let events = [
            MutationEvent::Local(Mutation::patch(key(), data(json!({"local": true}))).unwrap()),
            MutationEvent::Synced(synced_doc(json!({"remote": 1}), 4)),
        ];
        let result = apply_mutations(&key(), None, &events).unwrap();
        let doc = result.document().and_then(MaybeDocument::as_document).unwrap();
        assert_eq!(doc.data(), &data(json!({"local": true, "remote": 1})));
        assert_eq!(doc.version(), SnapshotVersion::from_seconds(4));
        assert!(doc.has_local_mutations());
    }

    #[test]
    fn patch_through_scalar_is_invalid_mutation() {
        let base = synced_doc(json!({"a": 1}), 1);
        let events = [MutationEvent::Local(Mutation::patch(key(), data(json!({"a": {"b": 2}}))).unwrap())];
        let err = apply_mutations(&key(), Some(base), &events).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-mutation");
        assert!(!err.is_retryable());
    }

    #[test]
    fn masked_path_without_value_deletes_field() {
        let base = synced_doc(json!({"a": 1, "b": 2}), 1);
        let mask = vec![FieldPath::from_dot_separated("b").unwrap()];
        let events = [MutationEvent::Local(Mutation::patch_with_mask(key(), MapValue::empty(), mask))];
        let result = apply_mutations(&key(), Some(base), &events).unwrap();
        let doc = result.document().and_then(MaybeDocument::as_document).unwrap();
        assert_eq!(doc.data(), &data(json!({"a": 1})));
    }

    #[test]
    fn patch_on_unknown_stays_unknown() {
        let base: MaybeDocument = UnknownDocument::new(key(), SnapshotVersion::from_seconds(2)).into();
        let events = [MutationEvent::Local(Mutation::patch(key(), data(json!({"a": 1}))).unwrap())];
        let result = apply_mutations(&key(), Some(base.clone()), &events).unwrap();
        assert_eq!(result.document(), Some(&base));
    }

    #[test]
    fn no_events_and_no_base_yields_nothing() {
        let result = apply_mutations(&key(), None, &[]).unwrap();
        assert!(result.document().is_none());
        assert!(!result.has_pending_writes());
    }

    #[test]
    fn folding_is_idempotent() {
        let base = synced_doc(json!({"a": 1}), 5);
        let events = vec![
            MutationEvent::Local(Mutation::set(key(), data(json!({"z": 1})))),
            MutationEvent::Local(Mutation::patch(key(), data(json!({"y": 2}))).unwrap()),
            MutationEvent::Local(Mutation::delete(key())),
            MutationEvent::Local(Mutation::patch(key(), data(json!({"x": 3}))).unwrap()),
        ];
        let first = apply_mutations(&key(), Some(base.clone()), &events).unwrap();
        let second = apply_mutations(&key(), Some(base), &events).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.document().and_then(MaybeDocument::as_document).map(|d| d.data().clone()),
            Some(data(json!({"x": 3})))
        );
    }

    #[test]
    fn rejects_events_for_other_keys() {
        let other = DocumentKey::from_string("restaurants/r2").unwrap();
        let events = [MutationEvent::Local(Mutation::delete(other))];
        let err = apply_mutations(&key(), None, &events).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn rejects_unknown_authoritative_reads() {
        let read: MaybeDocument = UnknownDocument::new(key(), SnapshotVersion::from_seconds(1)).into();
        let err = apply_mutations(&key(), None, &[MutationEvent::Synced(read)]).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }
}

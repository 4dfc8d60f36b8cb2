use std::collections::BTreeMap;

use crate::firestore::error::{invalid_mutation, FirestoreResult};
use crate::firestore::model::FieldPath;
use crate::firestore::value::{FirestoreValue, ValueKind};

/// Object node of a document's data tree. Writes return a new value and leave
/// `self` untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    fields: BTreeMap<String, FirestoreValue>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, FirestoreValue>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &BTreeMap<String, FirestoreValue> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolves a dotted path; `None` when any segment is missing or an
    /// intermediate value is not a map.
    pub fn get(&self, path: &FieldPath) -> Option<&FirestoreValue> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            current = current.as_map()?.fields.get(segment)?;
        }
        Some(current)
    }

    /// Returns a copy with `value` written at `path`, creating intermediate
    /// maps as needed.
    ///
    /// Fails with `InvalidMutation` when an ancestor of `path` holds a
    /// non-map value.
    pub fn with_value(&self, path: &FieldPath, value: FirestoreValue) -> FirestoreResult<Self> {
        let mut fields = self.fields.clone();
        set_at_segments(&mut fields, path.segments(), value, path)?;
        Ok(Self { fields })
    }

    /// Returns a copy with the field at `path` removed. Missing fields are
    /// ignored; a non-map ancestor is rejected like in [`MapValue::with_value`].
    pub fn without_field(&self, path: &FieldPath) -> FirestoreResult<Self> {
        let mut fields = self.fields.clone();
        remove_at_segments(&mut fields, path.segments(), path)?;
        Ok(Self { fields })
    }
}

fn set_at_segments(
    fields: &mut BTreeMap<String, FirestoreValue>,
    segments: &[String],
    value: FirestoreValue,
    full_path: &FieldPath,
) -> FirestoreResult<()> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(());
    };

    if rest.is_empty() {
        fields.insert(first.clone(), value);
        return Ok(());
    }

    let mut child_fields = match fields.get(first) {
        None => BTreeMap::new(),
        Some(existing) => match existing.kind() {
            ValueKind::Map(map) => map.fields().clone(),
            _ => return Err(ancestor_conflict(full_path, first, existing)),
        },
    };

    set_at_segments(&mut child_fields, rest, value, full_path)?;
    fields.insert(first.clone(), FirestoreValue::from_map(child_fields));
    Ok(())
}

fn remove_at_segments(
    fields: &mut BTreeMap<String, FirestoreValue>,
    segments: &[String],
    full_path: &FieldPath,
) -> FirestoreResult<()> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(());
    };

    if rest.is_empty() {
        fields.remove(first);
        return Ok(());
    }

    let mut child_fields = match fields.get(first) {
        None => return Ok(()),
        Some(existing) => match existing.kind() {
            ValueKind::Map(map) => map.fields().clone(),
            _ => return Err(ancestor_conflict(full_path, first, existing)),
        },
    };

    remove_at_segments(&mut child_fields, rest, full_path)?;
    fields.insert(first.clone(), FirestoreValue::from_map(child_fields));
    Ok(())
}

fn ancestor_conflict(
    full_path: &FieldPath,
    segment: &str,
    existing: &FirestoreValue,
) -> crate::firestore::error::FirestoreError {
    invalid_mutation(format!(
        "Cannot write field '{full_path}': ancestor '{segment}' holds a {} value, not a map",
        existing.type_name()
    ))
}

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::value::{FirestoreValue, MapValue};

/// Converts plain JSON into a value tree. Integers that fit `i64` stay
/// integers; every other number becomes a double.
pub fn value_from_json(json: &JsonValue) -> FirestoreValue {
    match json {
        JsonValue::Null => FirestoreValue::null(),
        JsonValue::Bool(value) => FirestoreValue::from_bool(*value),
        JsonValue::Number(number) => match number.as_i64() {
            Some(value) => FirestoreValue::from_integer(value),
            None => FirestoreValue::from_double(number.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(value) => FirestoreValue::from_string(value.clone()),
        JsonValue::Array(values) => {
            FirestoreValue::from_array(values.iter().map(value_from_json).collect())
        }
        JsonValue::Object(object) => FirestoreValue::from_map(
            object
                .iter()
                .map(|(name, value)| (name.clone(), value_from_json(value)))
                .collect(),
        ),
    }
}

/// Converts a JSON object into document data.
pub fn map_from_json(json: &JsonValue) -> FirestoreResult<MapValue> {
    match json {
        JsonValue::Object(object) => {
            let fields: BTreeMap<String, FirestoreValue> = object
                .iter()
                .map(|(name, value)| (name.clone(), value_from_json(value)))
                .collect();
            Ok(MapValue::new(fields))
        }
        other => Err(invalid_argument(format!(
            "Document data must be a JSON object, got {other}"
        ))),
    }
}

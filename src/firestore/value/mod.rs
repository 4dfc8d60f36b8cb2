mod array_value;
mod json;
mod map_value;
mod value;

pub use array_value::ArrayValue;
pub use json::{map_from_json, value_from_json};
pub use map_value::MapValue;
pub use value::{FirestoreValue, ValueKind};

mod document;
mod document_key;
mod document_set;
mod field_path;
mod mutation;
mod resource_path;
mod snapshot_version;
mod timestamp;

use std::collections::BTreeMap;

pub use document::{Document, DocumentExistence, DocumentState, MaybeDocument, NoDocument, UnknownDocument};
pub use document_key::DocumentKey;
pub use document_set::{DocumentComparator, DocumentSet};
pub use field_path::FieldPath;
pub use mutation::{Mutation, MutationEvent, MutationResult};
pub use resource_path::ResourcePath;
pub use snapshot_version::SnapshotVersion;
pub use timestamp::Timestamp;

/// Identifier of one active query registration.
pub type TargetId = i32;

/// Local view of every tracked key.
pub type MaybeDocumentMap = BTreeMap<DocumentKey, MaybeDocument>;

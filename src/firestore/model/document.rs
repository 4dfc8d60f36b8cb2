use crate::firestore::model::{DocumentKey, FieldPath, SnapshotVersion};
use crate::firestore::value::{FirestoreValue, MapValue};

/// Describes the pending-write state of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentState {
    /// Local mutations applied from the mutation queue; not yet acknowledged.
    LocalMutations,
    /// Mutations acknowledged by the backend, but the authoritative read has
    /// not round-tripped yet.
    CommittedMutations,
    /// Content delivered by the backend with nothing layered on top.
    Synced,
}

impl DocumentState {
    pub fn has_pending_writes(self) -> bool {
        !matches!(self, DocumentState::Synced)
    }
}

/// What a reader may conclude about a key's existence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentExistence {
    Exists,
    Missing,
    /// An acknowledged write proves the document was touched but its content
    /// has not been read back. Satisfies neither "exists" nor "deleted".
    Unconfirmed,
}

/// A document with materialized field data.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    key: DocumentKey,
    version: SnapshotVersion,
    data: MapValue,
    state: DocumentState,
}

impl Document {
    pub fn new(
        key: DocumentKey,
        version: SnapshotVersion,
        data: MapValue,
        state: DocumentState,
    ) -> Self {
        Self {
            key,
            version,
            data,
            state,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn data(&self) -> &MapValue {
        &self.data
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn field(&self, path: &FieldPath) -> Option<&FirestoreValue> {
        self.data.get(path)
    }

    pub fn has_pending_writes(&self) -> bool {
        self.state.has_pending_writes()
    }

    pub fn has_local_mutations(&self) -> bool {
        self.state == DocumentState::LocalMutations
    }

    pub fn has_committed_mutations(&self) -> bool {
        self.state == DocumentState::CommittedMutations
    }

    /// True when both documents carry the same version and data, regardless
    /// of their pending-write state.
    pub fn same_content(&self, other: &Document) -> bool {
        self.key == other.key && self.version == other.version && self.data == other.data
    }
}

/// A tombstone: the document is known not to exist at `version`.
#[derive(Clone, Debug, PartialEq)]
pub struct NoDocument {
    key: DocumentKey,
    version: SnapshotVersion,
    state: DocumentState,
}

impl NoDocument {
    pub fn new(key: DocumentKey, version: SnapshotVersion, state: DocumentState) -> Self {
        Self {
            key,
            version,
            state,
        }
    }

    /// Deletion delivered by the backend.
    pub fn synced(key: DocumentKey, version: SnapshotVersion) -> Self {
        Self::new(key, version, DocumentState::Synced)
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn has_committed_mutations(&self) -> bool {
        self.state == DocumentState::CommittedMutations
    }

    pub fn has_pending_writes(&self) -> bool {
        self.state.has_pending_writes()
    }
}

/// The backend acknowledged a write to this key, but the resulting content is
/// not known locally.
#[derive(Clone, Debug, PartialEq)]
pub struct UnknownDocument {
    key: DocumentKey,
    version: SnapshotVersion,
}

impl UnknownDocument {
    pub fn new(key: DocumentKey, version: SnapshotVersion) -> Self {
        Self { key, version }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }
}

/// Local knowledge about one document key at a point in time.
#[derive(Clone, Debug, PartialEq)]
pub enum MaybeDocument {
    Document(Document),
    NoDocument(NoDocument),
    Unknown(UnknownDocument),
}

impl MaybeDocument {
    pub fn key(&self) -> &DocumentKey {
        match self {
            MaybeDocument::Document(doc) => doc.key(),
            MaybeDocument::NoDocument(doc) => doc.key(),
            MaybeDocument::Unknown(doc) => doc.key(),
        }
    }

    pub fn version(&self) -> SnapshotVersion {
        match self {
            MaybeDocument::Document(doc) => doc.version(),
            MaybeDocument::NoDocument(doc) => doc.version(),
            MaybeDocument::Unknown(doc) => doc.version(),
        }
    }

    /// Unknown documents report `CommittedMutations`: they only arise from an
    /// acknowledged write.
    pub fn document_state(&self) -> DocumentState {
        match self {
            MaybeDocument::Document(doc) => doc.state(),
            MaybeDocument::NoDocument(doc) => doc.state(),
            MaybeDocument::Unknown(_) => DocumentState::CommittedMutations,
        }
    }

    pub fn has_pending_writes(&self) -> bool {
        self.document_state().has_pending_writes()
    }

    pub fn existence(&self) -> DocumentExistence {
        match self {
            MaybeDocument::Document(_) => DocumentExistence::Exists,
            MaybeDocument::NoDocument(_) => DocumentExistence::Missing,
            MaybeDocument::Unknown(_) => DocumentExistence::Unconfirmed,
        }
    }

    /// The only route to field data; matching code that needs fields goes
    /// through here and therefore never sees Unknown documents.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            MaybeDocument::Document(doc) => Some(doc),
            MaybeDocument::NoDocument(_) | MaybeDocument::Unknown(_) => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            MaybeDocument::Document(doc) => Some(doc),
            MaybeDocument::NoDocument(_) | MaybeDocument::Unknown(_) => None,
        }
    }

    pub fn field(&self, path: &FieldPath) -> Option<&FirestoreValue> {
        self.as_document().and_then(|doc| doc.field(path))
    }
}

impl From<Document> for MaybeDocument {
    fn from(doc: Document) -> Self {
        MaybeDocument::Document(doc)
    }
}

impl From<NoDocument> for MaybeDocument {
    fn from(doc: NoDocument) -> Self {
        MaybeDocument::NoDocument(doc)
    }
}

impl From<UnknownDocument> for MaybeDocument {
    fn from(doc: UnknownDocument) -> Self {
        MaybeDocument::Unknown(doc)
    }
}

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::firestore::model::{Document, DocumentKey};
use crate::util::assert;

/// Target-defined ordering of result documents.
pub type DocumentComparator = Arc<dyn Fn(&Document, &Document) -> Ordering + Send + Sync>;

/// Immutable collection of documents kept in the order given by a comparator,
/// with `DocumentKey` as the final tie-break so two distinct documents never
/// compare equal.
#[derive(Clone)]
pub struct DocumentSet {
    comparator: DocumentComparator,
    by_key: BTreeMap<DocumentKey, Document>,
    order: Vec<DocumentKey>,
}

impl DocumentSet {
    pub fn new(comparator: DocumentComparator) -> Self {
        Self {
            comparator,
            by_key: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Set ordered by key only.
    pub fn key_ordered() -> Self {
        Self::new(Arc::new(|_: &Document, _: &Document| Ordering::Equal))
    }

    /// Builds a set in one pass. Later documents replace earlier ones with the
    /// same key.
    pub fn from_documents(
        comparator: DocumentComparator,
        documents: impl IntoIterator<Item = Document>,
    ) -> Self {
        let mut set = Self::new(comparator);
        for document in documents {
            set.by_key.insert(document.key().clone(), document);
        }
        let mut sorted: Vec<&Document> = set.by_key.values().collect();
        sorted.sort_by(|left, right| set.compare(left, right));
        let order = sorted.into_iter().map(|doc| doc.key().clone()).collect();
        set.order = order;
        set
    }

    /// An empty set sharing this set's comparator.
    pub fn empty_like(&self) -> Self {
        Self::new(Arc::clone(&self.comparator))
    }

    pub fn comparator(&self) -> DocumentComparator {
        Arc::clone(&self.comparator)
    }

    /// Full ordering used inside the set, including the key tie-break.
    pub fn compare(&self, left: &Document, right: &Document) -> Ordering {
        (self.comparator)(left, right).then_with(|| left.key().cmp(right.key()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains_key(&self, key: &DocumentKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn get(&self, key: &DocumentKey) -> Option<&Document> {
        self.by_key.get(key)
    }

    pub fn first(&self) -> Option<&Document> {
        self.order.first().and_then(|key| self.by_key.get(key))
    }

    pub fn last(&self) -> Option<&Document> {
        self.order.last().and_then(|key| self.by_key.get(key))
    }

    pub fn index_of(&self, key: &DocumentKey) -> Option<usize> {
        self.order.iter().position(|candidate| candidate == key)
    }

    /// Documents in set order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> + '_ {
        self.order.iter().filter_map(|key| self.by_key.get(key))
    }

    pub fn keys(&self) -> BTreeSet<DocumentKey> {
        self.by_key.keys().cloned().collect()
    }

    /// Returns a new set containing `document`, replacing any entry with the
    /// same key.
    pub fn insert(&self, document: Document) -> Self {
        let mut next = self.remove(document.key());
        let position = next.order.partition_point(|key| {
            next.by_key
                .get(key)
                .map(|existing| next.compare(existing, &document) == Ordering::Less)
                .unwrap_or(false)
        });
        next.order.insert(position, document.key().clone());
        next.by_key.insert(document.key().clone(), document);
        assert(
            next.order.len() == next.by_key.len(),
            "DocumentSet order and key index diverged",
        );
        next
    }

    /// Returns a new set without `key`.
    pub fn remove(&self, key: &DocumentKey) -> Self {
        let mut next = self.clone();
        if next.by_key.remove(key).is_some() {
            next.order.retain(|candidate| candidate != key);
        }
        next
    }
}

impl PartialEq for DocumentSet {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.by_key == other.by_key
    }
}

impl Debug for DocumentSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.order.iter().map(|key| key.to_string())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::model::{DocumentState, FieldPath, SnapshotVersion};
    use crate::firestore::value::{map_from_json, ValueKind};
    use serde_json::json;

    fn doc(path: &str, rating: i64) -> Document {
        Document::new(
            DocumentKey::from_string(path).unwrap(),
            SnapshotVersion::from_seconds(1),
            map_from_json(&json!({ "rating": rating })).unwrap(),
            DocumentState::Synced,
        )
    }

    fn by_rating() -> DocumentComparator {
        let field = FieldPath::from_dot_separated("rating").unwrap();
        Arc::new(move |left: &Document, right: &Document| {
            let rating = |doc: &Document| match doc.field(&field).map(|v| v.kind()) {
                Some(ValueKind::Integer(value)) => *value,
                _ => 0,
            };
            rating(left).cmp(&rating(right))
        })
    }

    fn keys(set: &DocumentSet) -> Vec<String> {
        set.iter().map(|doc| doc.key().to_string()).collect()
    }

    #[test]
    fn orders_by_comparator_then_key() {
        let set = DocumentSet::new(by_rating())
            .insert(doc("r/c", 2))
            .insert(doc("r/b", 1))
            .insert(doc("r/a", 2));
        assert_eq!(keys(&set), vec!["r/b", "r/a", "r/c"]);
        assert_eq!(set.first().map(|d| d.key().id()), Some("b"));
        assert_eq!(set.last().map(|d| d.key().id()), Some("c"));
        assert_eq!(set.index_of(&DocumentKey::from_string("r/a").unwrap()), Some(1));
    }

    #[test]
    fn insert_replaces_and_reorders_existing_key() {
        let original = DocumentSet::new(by_rating())
            .insert(doc("r/a", 1))
            .insert(doc("r/b", 2));
        let updated = original.insert(doc("r/a", 3));
        assert_eq!(keys(&original), vec!["r/a", "r/b"]);
        assert_eq!(keys(&updated), vec!["r/b", "r/a"]);
        assert_eq!(updated.len(), 2);
    }

    #[test]
    fn remove_is_copy_on_write() {
        let set = DocumentSet::key_ordered().insert(doc("r/a", 1)).insert(doc("r/b", 1));
        let removed = set.remove(&DocumentKey::from_string("r/a").unwrap());
        assert_eq!(set.len(), 2);
        assert_eq!(keys(&removed), vec!["r/b"]);
        assert_eq!(removed.remove(&DocumentKey::from_string("r/zz").unwrap()), removed);
    }

    #[test]
    fn bulk_build_matches_incremental_inserts() {
        let docs = vec![doc("r/c", 2), doc("r/b", 1), doc("r/a", 2), doc("r/b", 5)];
        let bulk = DocumentSet::from_documents(by_rating(), docs.clone());
        let incremental = docs
            .into_iter()
            .fold(DocumentSet::new(by_rating()), |set, doc| set.insert(doc));
        assert_eq!(bulk, incremental);
        assert_eq!(keys(&bulk), vec!["r/a", "r/c", "r/b"]);
    }
}

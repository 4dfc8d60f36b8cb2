use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use firestore_local_view::firestore::core::{ChangeType, ListenOptions, ViewSnapshot};
use firestore_local_view::firestore::error::FirestoreResult;
use firestore_local_view::firestore::local::{
    LocalDocumentsView, LocalStorePersistence, LocalViewChanges, LocalViewEngine, MutationQueue,
    RemoteDocumentCache,
};
use firestore_local_view::firestore::model::{
    Document, DocumentKey, DocumentSet, DocumentState, MaybeDocument, Mutation, MutationEvent,
    MutationResult, SnapshotVersion,
};
use firestore_local_view::firestore::value::map_from_json;
use firestore_local_view::firestore::LocalCacheSettings;
use serde_json::{json, Value};

#[derive(Default)]
struct MemoryCache {
    documents: Mutex<BTreeMap<DocumentKey, MaybeDocument>>,
}

impl RemoteDocumentCache for MemoryCache {
    fn load_base_document(&self, key: &DocumentKey) -> FirestoreResult<Option<MaybeDocument>> {
        Ok(self.documents.lock().unwrap().get(key).cloned())
    }
}

#[derive(Default)]
struct MemoryQueue {
    events: Mutex<BTreeMap<DocumentKey, Vec<MutationEvent>>>,
    generation: AtomicU64,
}

impl MemoryQueue {
    fn push(&self, event: MutationEvent) {
        let key = event.key().clone();
        self.events.lock().unwrap().entry(key).or_default().push(event);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn replace(&self, key: &DocumentKey, events: Vec<MutationEvent>) {
        self.events.lock().unwrap().insert(key.clone(), events);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl MutationQueue for MemoryQueue {
    fn load_pending_mutations(&self, key: &DocumentKey) -> FirestoreResult<Vec<MutationEvent>> {
        Ok(self.events.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct PinLog {
    records: Mutex<Vec<(LocalViewChanges, u64)>>,
}

impl LocalStorePersistence for PinLog {
    fn apply_view_change(&self, changes: &LocalViewChanges, sequence: u64) -> FirestoreResult<()> {
        self.records.lock().unwrap().push((changes.clone(), sequence));
        Ok(())
    }
}

fn key(path: &str) -> DocumentKey {
    DocumentKey::from_string(path).unwrap()
}

fn keys(paths: &[&str]) -> BTreeSet<DocumentKey> {
    paths.iter().map(|path| key(path)).collect()
}

fn synced(path: &str, version: i64, data: Value) -> MaybeDocument {
    Document::new(
        key(path),
        SnapshotVersion::from_seconds(version),
        map_from_json(&data).unwrap(),
        DocumentState::Synced,
    )
    .into()
}

struct Harness {
    queue: Arc<MemoryQueue>,
    documents: LocalDocumentsView,
    engine: LocalViewEngine,
    pins: Arc<PinLog>,
    delivered: Arc<Mutex<Vec<ViewSnapshot>>>,
}

impl Harness {
    fn new() -> Self {
        let cache = Arc::new(MemoryCache::default());
        {
            let mut documents = cache.documents.lock().unwrap();
            documents.insert(key("rooms/a"), synced("rooms/a", 5, json!({"a": 1})));
            documents.insert(key("rooms/b"), synced("rooms/b", 5, json!({"n": 1})));
        }
        let queue = Arc::new(MemoryQueue::default());
        let settings = LocalCacheSettings::default();
        let documents = LocalDocumentsView::new(cache, queue.clone(), &settings);
        let pins = Arc::new(PinLog::default());
        let mut engine = LocalViewEngine::with_persistence(settings, pins.clone());

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        engine.listen(
            1,
            DocumentSet::key_ordered().comparator(),
            Some(ListenOptions {
                include_query_metadata_changes: true,
                include_document_metadata_changes: true,
            }),
            Arc::new(move |snapshot: ViewSnapshot| sink.lock().unwrap().push(snapshot)),
        );

        Self {
            queue,
            documents,
            engine,
            pins,
            delivered,
        }
    }

    fn evaluate(&mut self, membership: &[&str]) -> Option<ViewSnapshot> {
        let membership = keys(membership);
        let documents = self.documents.documents(&membership).unwrap();
        self.engine
            .apply_evaluation(1, &membership, &documents, true)
            .unwrap()
            .snapshot
    }
}

#[test]
fn pending_write_lifecycle_flows_through_views_and_pins() {
    let mut harness = Harness::new();

    let initial = harness.evaluate(&["rooms/a", "rooms/b"]).unwrap();
    assert_eq!(
        initial.keys_with_change(ChangeType::Added),
        keys(&["rooms/a", "rooms/b"])
    );
    assert!(!initial.has_pending_writes());

    let patch = Mutation::patch(key("rooms/a"), map_from_json(&json!({"b": 2})).unwrap()).unwrap();
    harness.queue.push(MutationEvent::Local(patch.clone()));
    let local = harness.evaluate(&["rooms/a", "rooms/b"]).unwrap();
    assert_eq!(local.keys_with_change(ChangeType::Modified), keys(&["rooms/a"]));
    assert_eq!(local.mutated_keys, keys(&["rooms/a"]));
    let patched = local.documents.get(&key("rooms/a")).unwrap();
    assert_eq!(patched.version(), SnapshotVersion::from_seconds(5));
    assert_eq!(patched.data(), &map_from_json(&json!({"a": 1, "b": 2})).unwrap());

    harness.queue.replace(
        &key("rooms/a"),
        vec![MutationEvent::Acknowledged(
            patch,
            MutationResult::new(SnapshotVersion::from_seconds(6)),
        )],
    );
    let acked = harness.evaluate(&["rooms/a", "rooms/b"]).unwrap();
    let committed = acked.documents.get(&key("rooms/a")).unwrap();
    assert!(committed.has_committed_mutations());
    assert!(acked.has_pending_writes());

    harness.queue.push(MutationEvent::Synced(synced(
        "rooms/a",
        6,
        json!({"a": 1, "b": 2}),
    )));
    let reconciled = harness.evaluate(&["rooms/a", "rooms/b"]).unwrap();
    assert_eq!(reconciled.keys_with_change(ChangeType::Metadata), keys(&["rooms/a"]));
    assert!(!reconciled.has_pending_writes());

    harness.queue.push(MutationEvent::Local(Mutation::delete(key("rooms/b"))));
    let deleted = harness.evaluate(&["rooms/a", "rooms/b"]).unwrap();
    assert_eq!(deleted.keys_with_change(ChangeType::Removed), keys(&["rooms/b"]));
    assert_eq!(
        harness.engine.references().references_for_target(1),
        keys(&["rooms/a"])
    );

    let released = harness.engine.unlisten(1).unwrap();
    assert_eq!(released, keys(&["rooms/a"]));
    assert!(harness.engine.references().is_empty());

    let records = harness.pins.records.lock().unwrap();
    let sequences: Vec<u64> = records.iter().map(|(_, sequence)| *sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
    let removed: Vec<BTreeSet<DocumentKey>> = records
        .iter()
        .map(|(changes, _)| changes.removed_keys().clone())
        .filter(|removed| !removed.is_empty())
        .collect();
    assert_eq!(removed, vec![keys(&["rooms/b"]), keys(&["rooms/a"])]);

    assert_eq!(harness.delivered.lock().unwrap().len(), 5);
}

#[test]
fn stale_authoritative_read_does_not_hide_local_write() {
    let mut harness = Harness::new();
    harness.evaluate(&["rooms/a"]);

    harness.queue.push(MutationEvent::Local(Mutation::set(
        key("rooms/a"),
        map_from_json(&json!({"a": 9})).unwrap(),
    )));
    harness
        .queue
        .push(MutationEvent::Synced(synced("rooms/a", 3, json!({"a": 0}))));

    let snapshot = harness.evaluate(&["rooms/a"]).unwrap();
    let document = snapshot.documents.get(&key("rooms/a")).unwrap();
    assert_eq!(document.data(), &map_from_json(&json!({"a": 9})).unwrap());
    assert!(document.has_local_mutations());
}

//! Local document cache and view synchronization for an offline-first
//! document store client.
//!
//! Every document key is tracked as a [`MaybeDocument`](firestore::model::MaybeDocument):
//! found, deleted, or known to exist without content. Pending local writes
//! are folded over the last synced state by
//! [`apply_mutations`](firestore::local::apply_mutations). Each active query
//! keeps a [`View`](firestore::core::View) whose diffs become
//! [`ViewSnapshot`](firestore::core::ViewSnapshot)s for listeners and
//! [`LocalViewChanges`](firestore::local::LocalViewChanges) records that tell
//! persistence which keys to pin or release.
//!
//! ```
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! use firestore_local_view::firestore::core::ViewSnapshot;
//! use firestore_local_view::firestore::local::{apply_mutations, LocalViewEngine};
//! use firestore_local_view::firestore::model::{DocumentKey, DocumentSet, MaybeDocumentMap, Mutation, MutationEvent};
//! use firestore_local_view::firestore::value::map_from_json;
//!
//! let key = DocumentKey::from_string("rooms/eros").unwrap();
//! let write = Mutation::set(key.clone(), map_from_json(&serde_json::json!({"name": "Eros"})).unwrap());
//! let local = apply_mutations(&key, None, &[MutationEvent::Local(write)])
//!     .unwrap()
//!     .into_document()
//!     .unwrap();
//! assert!(local.has_pending_writes());
//!
//! let mut engine = LocalViewEngine::default();
//! engine.listen(1, DocumentSet::key_ordered().comparator(), None, Arc::new(|_: ViewSnapshot| {}));
//! let documents: MaybeDocumentMap = [(key.clone(), local)].into_iter().collect();
//! let applied = engine
//!     .apply_evaluation(1, &BTreeSet::from([key.clone()]), &documents, false)
//!     .unwrap();
//! assert!(applied.view_changes.added_keys().contains(&key));
//! ```

pub mod firestore;
pub mod util;

use std::sync::Arc;

use crate::firestore::error::{stale_base, FirestoreResult};
use crate::firestore::local::mutation_applier::apply_mutations;
use crate::firestore::model::{
    DocumentKey, MaybeDocument, MaybeDocumentMap, MutationEvent, NoDocument, SnapshotVersion,
};
use crate::firestore::settings::{LocalCacheSettings, MAX_STALE_BASE_RETRIES};

/// Source of the last state received from the backend.
pub trait RemoteDocumentCache: Send + Sync {
    fn load_base_document(&self, key: &DocumentKey) -> FirestoreResult<Option<MaybeDocument>>;
}

/// Per-key log of mutation events, oldest first.
pub trait MutationQueue: Send + Sync {
    fn load_pending_mutations(&self, key: &DocumentKey) -> FirestoreResult<Vec<MutationEvent>>;

    /// Bumped whenever the queue changes. Two equal readings bracket a
    /// consistent read.
    fn generation(&self) -> u64;
}

/// Local view of documents: remote state with pending mutations applied.
#[derive(Clone)]
pub struct LocalDocumentsView {
    remote_documents: Arc<dyn RemoteDocumentCache>,
    mutation_queue: Arc<dyn MutationQueue>,
    stale_base_retries: u32,
}

impl LocalDocumentsView {
    /// Retry counts above [`MAX_STALE_BASE_RETRIES`] are clamped to it.
    pub fn new(
        remote_documents: Arc<dyn RemoteDocumentCache>,
        mutation_queue: Arc<dyn MutationQueue>,
        settings: &LocalCacheSettings,
    ) -> Self {
        let mut stale_base_retries = settings.stale_base_retries;
        if stale_base_retries > MAX_STALE_BASE_RETRIES {
            log::warn!(
                "stale_base_retries {stale_base_retries} exceeds {MAX_STALE_BASE_RETRIES}; clamping"
            );
            stale_base_retries = MAX_STALE_BASE_RETRIES;
        }
        Self {
            remote_documents,
            mutation_queue,
            stale_base_retries,
        }
    }

    /// Local view of `key`, or `None` when nothing is known about it.
    pub fn document(&self, key: &DocumentKey) -> FirestoreResult<Option<MaybeDocument>> {
        self.read_consistent(key, |view| {
            let base = view.remote_documents.load_base_document(key)?;
            view.fold(key, base)
        })
    }

    /// Local views of `keys`. Keys with no known state read as deleted.
    pub fn documents<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a DocumentKey>,
    ) -> FirestoreResult<MaybeDocumentMap> {
        let mut results = MaybeDocumentMap::new();
        for key in keys {
            let document = self
                .document(key)?
                .unwrap_or_else(|| NoDocument::synced(key.clone(), SnapshotVersion::none()).into());
            results.insert(key.clone(), document);
        }
        Ok(results)
    }

    /// Applies pending mutations to already loaded base documents.
    pub fn local_views(&self, base_documents: MaybeDocumentMap) -> FirestoreResult<MaybeDocumentMap> {
        let mut results = MaybeDocumentMap::new();
        for (key, base) in base_documents {
            let local = self.read_consistent(&key, |view| view.fold(&key, Some(base.clone())))?;
            if let Some(local) = local {
                results.insert(key, local);
            }
        }
        Ok(results)
    }

    fn fold(&self, key: &DocumentKey, base: Option<MaybeDocument>) -> FirestoreResult<Option<MaybeDocument>> {
        let events = self.mutation_queue.load_pending_mutations(key)?;
        Ok(apply_mutations(key, base, &events)?.into_document())
    }

    fn read_consistent<T>(
        &self,
        key: &DocumentKey,
        read: impl Fn(&Self) -> FirestoreResult<T>,
    ) -> FirestoreResult<T> {
        let mut attempt = 0;
        loop {
            let generation = self.mutation_queue.generation();
            let value = read(self)?;
            let after = self.mutation_queue.generation();
            if after == generation {
                return Ok(value);
            }
            if attempt >= self.stale_base_retries {
                return Err(stale_base(format!(
                    "Mutation queue changed while reading {key} (generation {generation} -> {after})"
                )));
            }
            attempt += 1;
            log::debug!("re-reading {key} after mutation queue changed (attempt {attempt})");
        }
    }
}

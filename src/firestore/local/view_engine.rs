use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::firestore::core::{ListenOptions, QueryListener, View, ViewSnapshot};
use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::local::local_view_changes::LocalViewChanges;
use crate::firestore::local::reference_set::ReferenceSet;
use crate::firestore::model::{DocumentComparator, DocumentKey, MaybeDocumentMap, TargetId};
use crate::firestore::settings::LocalCacheSettings;

/// Hooks invoked as targets change membership. Every method defaults to a
/// no-op so in-memory callers need not implement anything.
pub trait LocalStorePersistence: Send + Sync {
    /// Receives exactly one record per evaluation of a target. `sequence`
    /// increases strictly per target. An error aborts the evaluation.
    ///
    /// Numbering belongs to a single registration of the target: once a
    /// target is unlistened, listening to the same id again starts over at 1.
    fn apply_view_change(&self, _changes: &LocalViewChanges, _sequence: u64) -> FirestoreResult<()> {
        Ok(())
    }

    /// Keys no target pins anymore.
    fn release_documents(&self, _keys: &BTreeSet<DocumentKey>) {}
}

pub type ViewSnapshotCallback = Arc<dyn Fn(ViewSnapshot) + Send + Sync>;

/// Handle returned by [`LocalViewEngine::listen`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerRegistration {
    target_id: TargetId,
    listener_id: u64,
}

impl ListenerRegistration {
    pub fn target_id(&self) -> TargetId {
        self.target_id
    }
}

/// What one successful evaluation committed.
#[derive(Clone, Debug)]
pub struct AppliedEvaluation {
    pub snapshot: Option<ViewSnapshot>,
    pub view_changes: LocalViewChanges,
    pub released_keys: BTreeSet<DocumentKey>,
    pub sequence: u64,
}

struct ListenerEntry {
    id: u64,
    listener: QueryListener,
    callback: ViewSnapshotCallback,
}

struct TargetState {
    view: View,
    sequence: u64,
    listeners: Vec<ListenerEntry>,
}

/// Keeps one view per active target, the pin index, and the listeners.
///
/// Evaluations are computed against the current view without touching it and
/// only committed once persistence accepted the resulting record, so a failed
/// evaluation leaves the engine exactly as it was.
pub struct LocalViewEngine {
    targets: BTreeMap<TargetId, TargetState>,
    references: ReferenceSet,
    persistence: Option<Arc<dyn LocalStorePersistence>>,
    settings: LocalCacheSettings,
    next_listener_id: u64,
}

impl Debug for LocalViewEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalViewEngine")
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("references", &self.references)
            .finish()
    }
}

impl Default for LocalViewEngine {
    fn default() -> Self {
        Self::new(LocalCacheSettings::default())
    }
}

impl LocalViewEngine {
    pub fn new(settings: LocalCacheSettings) -> Self {
        Self {
            targets: BTreeMap::new(),
            references: ReferenceSet::new(),
            persistence: None,
            settings,
            next_listener_id: 0,
        }
    }

    pub fn with_persistence(
        settings: LocalCacheSettings,
        persistence: Arc<dyn LocalStorePersistence>,
    ) -> Self {
        Self {
            persistence: Some(persistence),
            ..Self::new(settings)
        }
    }

    pub fn settings(&self) -> &LocalCacheSettings {
        &self.settings
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn view(&self, target_id: TargetId) -> Option<&View> {
        self.targets.get(&target_id).map(|state| &state.view)
    }

    pub fn target_ids(&self) -> Vec<TargetId> {
        self.targets.keys().copied().collect()
    }

    /// Registers a listener, creating the target on first use. `None` options
    /// fall back to the configured defaults. A listener joining a target that
    /// was already evaluated receives the current results right away.
    ///
    /// `comparator` only takes effect when the target is created. Listeners
    /// joining an existing target see the order of the first registration.
    pub fn listen(
        &mut self,
        target_id: TargetId,
        comparator: DocumentComparator,
        options: Option<ListenOptions>,
        callback: ViewSnapshotCallback,
    ) -> ListenerRegistration {
        let options = options.unwrap_or(self.settings.default_listen_options);
        let id = self.next_listener_id;
        self.next_listener_id += 1;

        let state = match self.targets.entry(target_id) {
            Entry::Occupied(entry) => {
                log::debug!(
                    "target {target_id} already registered, keeping its document order"
                );
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                log::debug!("target {target_id} registered");
                entry.insert(TargetState {
                    view: View::new(target_id, comparator),
                    sequence: 0,
                    listeners: Vec::new(),
                })
            }
        };

        let mut listener = QueryListener::new(options);
        let initial = if state.view.has_evaluated() {
            let view = &state.view;
            listener.on_view_snapshot(ViewSnapshot::from_initial_documents(
                target_id,
                view.documents().clone(),
                view.mutated_keys().clone(),
                !view.is_current(),
                false,
            ))
        } else {
            None
        };

        state.listeners.push(ListenerEntry {
            id,
            listener,
            callback: Arc::clone(&callback),
        });

        if let Some(snapshot) = initial {
            (callback)(snapshot);
        }

        ListenerRegistration {
            target_id,
            listener_id: id,
        }
    }

    /// Removes one listener. The last listener leaving a target releases it;
    /// if that release fails the listener stays registered.
    pub fn remove_listener(
        &mut self,
        registration: ListenerRegistration,
    ) -> FirestoreResult<BTreeSet<DocumentKey>> {
        let state = self.target_state(registration.target_id)?;
        let is_last = state
            .listeners
            .iter()
            .all(|entry| entry.id == registration.listener_id);
        if is_last {
            return self.unlisten(registration.target_id);
        }

        self.target_state_mut(registration.target_id)?
            .listeners
            .retain(|entry| entry.id != registration.listener_id);
        Ok(BTreeSet::new())
    }

    /// Drops a target and every pin it holds. Returns the released keys.
    ///
    /// The target's sequence numbering ends here; a later `listen` on the
    /// same id starts a fresh registration.
    pub fn unlisten(&mut self, target_id: TargetId) -> FirestoreResult<BTreeSet<DocumentKey>> {
        let state = self.target_state(target_id)?;
        let sequence = state.sequence + 1;
        let pinned = self.references.references_for_target(target_id);
        let changes = LocalViewChanges::from_key_sets(target_id, &pinned, &BTreeSet::new())?;
        self.persist(&changes, sequence)?;

        let released = self.references.remove_references_for_target(target_id);
        self.targets.remove(&target_id);
        self.release(&released);
        log::debug!(
            "target {target_id} removed, {} keys released",
            released.len()
        );
        Ok(released)
    }

    /// Applies one evaluation of `target_id`: `membership` is the externally
    /// computed result key set and `documents` the local view of those keys.
    pub fn apply_evaluation(
        &mut self,
        target_id: TargetId,
        membership: &BTreeSet<DocumentKey>,
        documents: &MaybeDocumentMap,
        current: bool,
    ) -> FirestoreResult<AppliedEvaluation> {
        let state = self.target_state(target_id)?;
        let sequence = state.sequence + 1;
        let change = state.view.evaluate(membership, documents, current)?;
        let view_changes = match &change.snapshot {
            Some(snapshot) => LocalViewChanges::from_view_snapshot(target_id, snapshot)?,
            None => LocalViewChanges::new(target_id, BTreeSet::new(), BTreeSet::new())?,
        };
        self.persist(&view_changes, sequence)?;

        let released_keys = self.references.apply_view_changes(&view_changes);
        let state = self.target_state_mut(target_id)?;
        state.view = change.view;
        state.sequence = sequence;

        let mut deliveries = Vec::new();
        if let Some(snapshot) = &change.snapshot {
            for entry in state.listeners.iter_mut() {
                if let Some(raised) = entry.listener.on_view_snapshot(snapshot.clone()) {
                    deliveries.push((Arc::clone(&entry.callback), raised));
                }
            }
        }

        self.release(&released_keys);
        for (callback, snapshot) in deliveries {
            (callback)(snapshot);
        }

        Ok(AppliedEvaluation {
            snapshot: change.snapshot,
            view_changes,
            released_keys,
            sequence,
        })
    }

    fn persist(&self, changes: &LocalViewChanges, sequence: u64) -> FirestoreResult<()> {
        match &self.persistence {
            Some(persistence) => persistence.apply_view_change(changes, sequence).map_err(|err| {
                log::warn!(
                    "persistence rejected view change #{sequence} for target {}: {err}",
                    changes.target_id()
                );
                err
            }),
            None => Ok(()),
        }
    }

    fn release(&self, keys: &BTreeSet<DocumentKey>) {
        if keys.is_empty() {
            return;
        }
        if let Some(persistence) = &self.persistence {
            persistence.release_documents(keys);
        }
    }

    fn target_state(&self, target_id: TargetId) -> FirestoreResult<&TargetState> {
        self.targets
            .get(&target_id)
            .ok_or_else(|| invalid_argument(format!("Target {target_id} is not being listened to")))
    }

    fn target_state_mut(&mut self, target_id: TargetId) -> FirestoreResult<&mut TargetState> {
        self.targets
            .get_mut(&target_id)
            .ok_or_else(|| invalid_argument(format!("Target {target_id} is not being listened to")))
    }
}
